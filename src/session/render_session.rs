use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, FfmpegTools};
use crate::encode::mux::{AudioTrack, AudioTreatment, CommandOutcome, MuxRequest, Muxer};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::layout::planner::LayoutPlan;
use crate::layout::store::ClipId;
use crate::media::probe::VideoInfo;
use crate::media::source::VideoSource;
use crate::sequence::sequencer::{AssemblyMode, FrameSequencer, SequenceStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Creates the sink that writes the silent intermediate at the given path.
pub type SinkFactory = Box<dyn Fn(&Path) -> OverlayResult<Box<dyn FrameSink>> + Send + Sync>;

/// Sink factory producing [`FfmpegSink`]s.
pub fn ffmpeg_sink_factory(tools: FfmpegTools) -> SinkFactory {
    Box::new(move |path: &Path| {
        let opts = FfmpegSinkOpts {
            out_path: path.to_path_buf(),
            overwrite: true,
            tools: tools.clone(),
        };
        Ok(Box::new(FfmpegSink::new(opts)) as Box<dyn FrameSink>)
    })
}

/// One output video: both sources, the committed plan and the assembly mode.
#[derive(Clone)]
pub struct RenderJob {
    pub clip: ClipId,
    pub main: Arc<dyn VideoSource>,
    pub avatar: Arc<dyn VideoSource>,
    pub plan: LayoutPlan,
    pub mode: AssemblyMode,
    /// Final muxed file.
    pub out_path: PathBuf,
}

/// Options controlling [`RenderSession`] output.
#[derive(Clone, Debug)]
pub struct RenderSessionOpts {
    /// Directory for silent intermediates.
    pub work_dir: PathBuf,
    /// Overwrite an existing final output.
    pub overwrite: bool,
}

impl Default for RenderSessionOpts {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("overlayer"),
            overwrite: true,
        }
    }
}

/// A finished render.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOutput {
    pub path: PathBuf,
    pub stats: SequenceStats,
    /// Muxer diagnostics for the successful run.
    pub mux: CommandOutcome,
}

/// Drives a [`FrameSequencer`] into a silent video, then hands it to a [`Muxer`].
pub struct RenderSession {
    sequencer: FrameSequencer,
    sinks: SinkFactory,
    muxer: Box<dyn Muxer>,
    opts: RenderSessionOpts,
}

impl RenderSession {
    pub fn new(
        sequencer: FrameSequencer,
        sinks: SinkFactory,
        muxer: Box<dyn Muxer>,
        opts: RenderSessionOpts,
    ) -> Self {
        Self {
            sequencer,
            sinks,
            muxer,
            opts,
        }
    }

    /// Render `job` to `job.out_path`.
    ///
    /// The silent intermediate is removed on every exit path.
    #[tracing::instrument(skip_all, fields(clip = %job.clip, mode = %job.mode))]
    pub fn render(&self, job: &RenderJob) -> OverlayResult<RenderOutput> {
        if !self.opts.overwrite && job.out_path.exists() {
            return Err(OverlayError::validation(format!(
                "output file '{}' already exists",
                job.out_path.display()
            )));
        }

        let silent = self.silent_path(job);
        let _silent_guard = TempFileGuard(Some(silent.clone()));

        let stats = self.encode_silent(job, &silent)?;
        let req = mux_request(job, &silent, stats, self.opts.overwrite);
        tracing::debug!(?stats, video_secs = req.video_secs, "silent video encoded");

        let mux = self.muxer.mux(&req)?;
        Ok(RenderOutput {
            path: job.out_path.clone(),
            stats,
            mux,
        })
    }

    fn encode_silent(&self, job: &RenderJob, silent: &Path) -> OverlayResult<SequenceStats> {
        let info = job.main.info();
        let mut seq = self.sequencer.sequence(
            job.main.as_ref(),
            job.avatar.as_ref(),
            &job.plan,
            job.mode,
        )?;

        let mut sink = (self.sinks)(silent)?;
        sink.begin(SinkConfig {
            size: info.size,
            fps: info.fps,
        })?;
        let mut idx = 0u64;
        for frame in seq.by_ref() {
            sink.push_frame(FrameIndex(idx), &frame?)?;
            idx += 1;
        }
        sink.end()?;

        let stats = seq.stats();
        if stats.frames_emitted == 0 {
            return Err(OverlayError::encode("frame sequence produced no frames"));
        }
        Ok(stats)
    }

    fn silent_path(&self, job: &RenderJob) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.opts.work_dir.join(format!(
            "{}_{}_{}_{nanos}.silent.mp4",
            job.clip,
            job.mode,
            std::process::id()
        ))
    }
}

/// Audio treatment and per-track spans for a finished sequence.
pub fn mux_request(
    job: &RenderJob,
    silent: &Path,
    stats: SequenceStats,
    overwrite: bool,
) -> MuxRequest {
    let main = job.main.info();
    let avatar = job.avatar.info();
    let video_secs = main.fps.frames_to_secs(stats.frames_emitted);
    let track = |info: &VideoInfo, span_secs: f64| AudioTrack {
        source: info.path.clone(),
        has_audio: info.has_audio,
        span_secs,
    };

    let (treatment, tracks) = match job.mode {
        AssemblyMode::Parallel => (
            AudioTreatment::MixFirst,
            vec![track(main, video_secs), track(avatar, video_secs)],
        ),
        AssemblyMode::Sequential => (
            AudioTreatment::Concat,
            vec![
                track(avatar, main.fps.frames_to_secs(stats.frozen_frames)),
                track(main, main.fps.frames_to_secs(stats.playback_frames)),
            ],
        ),
    };

    MuxRequest {
        video: silent.to_path_buf(),
        video_secs,
        treatment,
        tracks,
        out_path: job.out_path.clone(),
        overwrite,
    }
}

/// Removes the wrapped file when dropped.
struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_session.rs"]
mod tests;
