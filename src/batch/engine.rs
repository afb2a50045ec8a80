use crate::config::EngineConfig;
use crate::encode::mux::{FfmpegMuxer, Muxer};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::layout::planner::{LayoutPlan, LayoutPlanner, clip_rng};
use crate::layout::store::{ClipId, PlanStore, clip_ids};
use crate::media::source::{FfmpegSourceProvider, SourceProvider, VideoSource};
use crate::sequence::sequencer::{AssemblyMode, FrameSequencer, preview_frame};
use crate::session::render_session::{
    RenderJob, RenderSession, RenderSessionOpts, SinkFactory, ffmpeg_sink_factory,
};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation, checked between clips.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome for one avatar clip of a batch.
#[derive(Debug)]
pub struct ClipReport<T> {
    pub clip: ClipId,
    pub avatar: PathBuf,
    pub result: OverlayResult<T>,
}

impl<T> ClipReport<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn output(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }
}

/// A written preview still and the plan it was drawn with.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewOutput {
    pub image_path: PathBuf,
    pub plan: LayoutPlan,
    /// `true` when an already committed plan was replayed instead of drawing a new one.
    pub reused: bool,
}

/// Successful previews as parallel, avatar-ordered lists.
///
/// `avatars[i]` was previewed into `images[i]` using `plans[i]`; feeding `avatars` and `plans`
/// back into [`OverlayEngine::generate_videos`] renders exactly what was previewed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreviewSet {
    pub avatars: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
    pub plans: Vec<LayoutPlan>,
}

impl PreviewSet {
    pub fn from_reports(reports: &[ClipReport<PreviewOutput>]) -> Self {
        let mut set = Self::default();
        for report in reports {
            if let Ok(out) = &report.result {
                set.avatars.push(report.avatar.clone());
                set.images.push(out.image_path.clone());
                set.plans.push(out.plan.clone());
            }
        }
        set
    }
}

/// File name of the preview still for `clip`.
pub fn preview_file_name(clip: &ClipId) -> String {
    format!("preview_{clip}.png")
}

/// File name of the generated video for `clip` in `mode`.
pub fn video_file_name(clip: &ClipId, mode: AssemblyMode) -> String {
    format!("generated_{clip}_{mode}.mp4")
}

/// Batch driver: previews commit plans, renders replay them.
///
/// Clips are processed one at a time in avatar order. Source and encode failures are recorded
/// against their clip and the batch continues.
pub struct OverlayEngine {
    config: EngineConfig,
    planner: LayoutPlanner,
    sources: Box<dyn SourceProvider>,
    session: RenderSession,
    plans: PlanStore,
    cancel: CancelToken,
}

impl OverlayEngine {
    /// Engine backed by the system `ffmpeg` / `ffprobe`.
    pub fn new(config: EngineConfig) -> OverlayResult<Self> {
        let tools = config.tools.clone();
        Self::with_backends(
            config,
            Box::new(FfmpegSourceProvider::new(tools.clone())),
            ffmpeg_sink_factory(tools.clone()),
            Box::new(FfmpegMuxer::new(tools)),
        )
    }

    pub fn with_backends(
        config: EngineConfig,
        sources: Box<dyn SourceProvider>,
        sinks: SinkFactory,
        muxer: Box<dyn Muxer>,
    ) -> OverlayResult<Self> {
        config.validate()?;
        let planner = LayoutPlanner::new(config.layout.clone())?;
        let session = RenderSession::new(
            FrameSequencer::new(config.chroma_key),
            sinks,
            muxer,
            RenderSessionOpts {
                work_dir: config.work_dir.clone(),
                overwrite: config.overwrite,
            },
        );
        Ok(Self {
            config,
            planner,
            sources,
            session,
            plans: PlanStore::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plans committed by previews (or loaded) so far.
    pub fn plans(&self) -> &PlanStore {
        &self.plans
    }

    /// Adopt previously saved plans; they win over plans already held.
    pub fn load_plans(&mut self, store: PlanStore) {
        self.plans.extend(store);
    }

    /// Forget every committed plan so the next preview draws fresh layouts.
    pub fn discard_plans(&mut self) {
        self.plans.clear();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Render one preview still per avatar clip and commit its plan.
    ///
    /// A clip that already has a plan fitting this main video replays it. Fails as a whole only
    /// when the avatar set is invalid; an unreadable main video fails every clip.
    #[tracing::instrument(skip_all, fields(main = %main.display(), clips = avatars.len()))]
    pub fn generate_previews(
        &mut self,
        main: &Path,
        avatars: &[PathBuf],
    ) -> OverlayResult<Vec<ClipReport<PreviewOutput>>> {
        let ids = clip_ids(avatars)?;
        let opened = self
            .sources
            .open(main)
            .and_then(|src| src.first_frame().map(|first| (src, first)));
        let (main_src, main_first) = match opened {
            Ok(pair) => pair,
            Err(e) => return Ok(main_failure(main, &e, avatars, ids)),
        };
        create_dir(&self.config.preview_dir)?;

        let mut reports = Vec::with_capacity(ids.len());
        for (avatar, clip) in avatars.iter().zip(ids) {
            let result = if self.cancel.is_cancelled() {
                Err(OverlayError::Cancelled)
            } else {
                self.preview_clip(main_src.as_ref(), &main_first, avatar, &clip)
            };
            match &result {
                Ok(out) => {
                    tracing::info!(%clip, image = %out.image_path.display(), reused = out.reused, "preview written");
                    self.plans.commit(clip.clone(), out.plan.clone());
                }
                Err(e) => log_clip_failure(&clip, e),
            }
            reports.push(ClipReport {
                clip,
                avatar: avatar.clone(),
                result,
            });
        }
        Ok(reports)
    }

    fn preview_clip(
        &self,
        main: &dyn VideoSource,
        main_first: &RgbImage,
        avatar_path: &Path,
        clip: &ClipId,
    ) -> OverlayResult<PreviewOutput> {
        let main_size = main.info().size;
        let avatar = self.sources.open(avatar_path)?;
        let avatar_first = avatar.first_frame()?;

        let committed = self
            .plans
            .get(clip)
            .filter(|p| p.validate(main_size).is_ok());
        let (plan, reused) = match committed {
            Some(plan) => (plan.clone(), true),
            None => {
                let mut rng = clip_rng(self.config.seed, clip);
                let aspect = avatar.info().size.aspect_ratio();
                (self.planner.plan(&mut rng, main_size, aspect)?, false)
            }
        };
        tracing::debug!(%clip, ?plan, reused, "layout plan");

        let image_path = self.config.preview_dir.join(preview_file_name(clip));
        if !self.config.overwrite && image_path.exists() {
            return Err(OverlayError::validation(format!(
                "preview '{}' already exists",
                image_path.display()
            )));
        }
        let still = preview_frame(main_first, &avatar_first, &plan, &self.config.chroma_key)?;
        still.save(&image_path).map_err(|e| {
            OverlayError::encode(format!(
                "failed to write preview '{}': {e}",
                image_path.display()
            ))
        })?;

        Ok(PreviewOutput {
            image_path,
            plan,
            reused,
        })
    }

    /// Render every avatar clip with the plan at the same position in `plans`.
    ///
    /// A `plans` list shorter than `avatars` is a plan error for the whole request.
    pub fn generate_videos(
        &self,
        main: &Path,
        avatars: &[PathBuf],
        plans: &[LayoutPlan],
        mode: AssemblyMode,
    ) -> OverlayResult<Vec<ClipReport<PathBuf>>> {
        let store = PlanStore::from_ordered(avatars, plans)?;
        self.generate_from_store(main, avatars, &store, mode)
    }

    /// Render every avatar clip with the plans this engine committed during previews.
    pub fn generate_committed(
        &self,
        main: &Path,
        avatars: &[PathBuf],
        mode: AssemblyMode,
    ) -> OverlayResult<Vec<ClipReport<PathBuf>>> {
        self.generate_from_store(main, avatars, &self.plans, mode)
    }

    /// Render every avatar clip with its plan from `store`.
    ///
    /// Every clip must have a plan drawn for this main video, otherwise nothing is rendered and a
    /// plan error is returned. An unreadable main video fails every clip.
    #[tracing::instrument(skip_all, fields(main = %main.display(), clips = avatars.len(), %mode))]
    pub fn generate_from_store(
        &self,
        main: &Path,
        avatars: &[PathBuf],
        store: &PlanStore,
        mode: AssemblyMode,
    ) -> OverlayResult<Vec<ClipReport<PathBuf>>> {
        let ids = clip_ids(avatars)?;
        let plans = ids
            .iter()
            .map(|clip| store.require(clip).cloned())
            .collect::<OverlayResult<Vec<_>>>()?;

        let main_src = match self.sources.open(main) {
            Ok(src) => src,
            Err(e) => return Ok(main_failure(main, &e, avatars, ids)),
        };
        let main_size = main_src.info().size;
        for (clip, plan) in ids.iter().zip(&plans) {
            plan.validate(main_size).map_err(|e| {
                OverlayError::plan(format!("committed plan for '{clip}' is unusable: {e}"))
            })?;
        }
        create_dir(&self.config.output_dir)?;

        let mut reports = Vec::with_capacity(ids.len());
        for ((avatar, clip), plan) in avatars.iter().zip(ids).zip(plans) {
            let result = if self.cancel.is_cancelled() {
                Err(OverlayError::Cancelled)
            } else {
                tracing::info!(%clip, "rendering");
                self.render_clip(&main_src, avatar, &clip, plan, mode)
            };
            match &result {
                Ok(path) => tracing::info!(%clip, out = %path.display(), "video written"),
                Err(e) => log_clip_failure(&clip, e),
            }
            reports.push(ClipReport {
                clip,
                avatar: avatar.clone(),
                result,
            });
        }
        Ok(reports)
    }

    fn render_clip(
        &self,
        main: &Arc<dyn VideoSource>,
        avatar_path: &Path,
        clip: &ClipId,
        plan: LayoutPlan,
        mode: AssemblyMode,
    ) -> OverlayResult<PathBuf> {
        let avatar = self.sources.open(avatar_path)?;
        let job = RenderJob {
            clip: clip.clone(),
            main: main.clone(),
            avatar,
            plan,
            mode,
            out_path: self.config.output_dir.join(video_file_name(clip, mode)),
        };
        let out = self.session.render(&job)?;
        tracing::debug!(%clip, stats = ?out.stats, "render finished");
        Ok(out.path)
    }
}

/// One `Source` failure per clip for a main video that could not be opened or read.
fn main_failure<T>(
    main: &Path,
    err: &OverlayError,
    avatars: &[PathBuf],
    ids: Vec<ClipId>,
) -> Vec<ClipReport<T>> {
    tracing::warn!(main = %main.display(), error = %err, "main video unreadable, no clip can be processed");
    avatars
        .iter()
        .zip(ids)
        .map(|(avatar, clip)| ClipReport {
            clip,
            avatar: avatar.clone(),
            result: Err(OverlayError::source(format!(
                "main video '{}' is unreadable: {err}",
                main.display()
            ))),
        })
        .collect()
}

fn log_clip_failure(clip: &ClipId, err: &OverlayError) {
    if matches!(err, OverlayError::Cancelled) {
        tracing::info!(%clip, "skipped after cancellation");
    } else if err.is_clip_recoverable() {
        tracing::warn!(%clip, error = %err, "clip failed, continuing with the batch");
    } else {
        tracing::error!(%clip, error = %err, "clip failed");
    }
}

fn create_dir(dir: &Path) -> OverlayResult<()> {
    use anyhow::Context as _;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/batch/engine.rs"]
mod tests;
