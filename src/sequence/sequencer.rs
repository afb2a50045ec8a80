use crate::effects::chroma_key::{ChromaKey, extract_alpha};
use crate::effects::composite::composite;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::layout::planner::LayoutPlan;
use crate::media::source::{FrameStream, VideoSource};
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};

/// Temporal strategy for combining the main and avatar streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMode {
    /// Both play together; the avatar loops until the main video ends.
    Parallel,
    /// The avatar plays once over the frozen first main frame, then the main video plays in full.
    Sequential,
}

impl AssemblyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

impl std::fmt::Display for AssemblyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssemblyMode {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            other => Err(OverlayError::validation(format!(
                "unknown assembly mode '{other}' (expected parallel or sequential)"
            ))),
        }
    }
}

/// Counters collected while a [`FrameSequence`] is drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceStats {
    /// Frames yielded so far.
    pub frames_emitted: u64,
    /// Avatar frames composited.
    pub avatar_frames: u64,
    /// Times the avatar stream was restarted (parallel mode).
    pub avatar_loops: u64,
    /// Frames over the frozen backdrop (sequential mode).
    pub frozen_frames: u64,
    /// Main frames played without an overlay (sequential mode).
    pub playback_frames: u64,
}

/// Builds composited frame sequences for a fixed chroma key.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameSequencer {
    key: ChromaKey,
}

impl FrameSequencer {
    pub fn new(key: ChromaKey) -> Self {
        Self { key }
    }

    /// Open both sources from their start and prepare a lazy sequence for `mode`.
    ///
    /// Fails with `Source` when a stream cannot be opened or has no first frame, and with `Plan`
    /// when `plan` does not fit the main video.
    pub fn sequence<'a>(
        &self,
        main: &'a dyn VideoSource,
        avatar: &'a dyn VideoSource,
        plan: &LayoutPlan,
        mode: AssemblyMode,
    ) -> OverlayResult<FrameSequence<'a>> {
        plan.validate(main.info().size)?;

        let mut main_stream = main.frames()?;
        let first_main = first_of(&mut main_stream, main)?;
        let mut avatar_stream = avatar.frames()?;
        let first_avatar = first_of(&mut avatar_stream, avatar)?;

        let state = match mode {
            AssemblyMode::Parallel => State::Parallel {
                main: main_stream,
                avatar: avatar_stream,
                pending_main: Some(first_main),
                pending_avatar: Some(first_avatar),
            },
            AssemblyMode::Sequential => State::Frozen {
                backdrop: process_main(&first_main, plan)?,
                avatar: avatar_stream,
                pending_avatar: Some(first_avatar),
                // Segment B restarts from the first frame; the open stream already sits after it.
                main: main_stream,
                pending_main: Some(first_main),
            },
        };

        Ok(FrameSequence {
            avatar_source: avatar,
            plan: plan.clone(),
            key: self.key,
            mode,
            state,
            stats: SequenceStats::default(),
        })
    }
}

fn first_of(stream: &mut FrameStream<'_>, source: &dyn VideoSource) -> OverlayResult<RgbImage> {
    stream.next().unwrap_or_else(|| {
        Err(OverlayError::source(format!(
            "no readable frame in '{}'",
            source.info().path.display()
        )))
    })
}

enum State<'a> {
    Parallel {
        main: FrameStream<'a>,
        avatar: FrameStream<'a>,
        pending_main: Option<RgbImage>,
        pending_avatar: Option<RgbImage>,
    },
    Frozen {
        backdrop: RgbImage,
        avatar: FrameStream<'a>,
        pending_avatar: Option<RgbImage>,
        main: FrameStream<'a>,
        pending_main: Option<RgbImage>,
    },
    Playback {
        main: FrameStream<'a>,
        pending_main: Option<RgbImage>,
    },
    Done,
}

/// Lazy, finite sequence of composited frames.
///
/// After the first `Err` item the sequence is fused and yields nothing further.
pub struct FrameSequence<'a> {
    avatar_source: &'a dyn VideoSource,
    plan: LayoutPlan,
    key: ChromaKey,
    mode: AssemblyMode,
    state: State<'a>,
    stats: SequenceStats,
}

impl FrameSequence<'_> {
    pub fn mode(&self) -> AssemblyMode {
        self.mode
    }

    pub fn stats(&self) -> SequenceStats {
        self.stats
    }

    fn overlay(&self, background: RgbImage, raw_avatar: &RgbImage) -> RgbImage {
        let fg = process_avatar(raw_avatar, &self.plan, &self.key);
        composite(
            background,
            &fg,
            i64::from(self.plan.offset.x),
            i64::from(self.plan.offset.y),
        )
    }

    fn step(&mut self) -> OverlayResult<Option<RgbImage>> {
        loop {
            match &mut self.state {
                State::Done => return Ok(None),
                State::Parallel {
                    main,
                    avatar,
                    pending_main,
                    pending_avatar,
                } => {
                    let Some(raw_main) = next_frame(pending_main, main)? else {
                        return Ok(None);
                    };
                    let raw_avatar = match next_frame(pending_avatar, avatar)? {
                        Some(frame) => frame,
                        None => {
                            let source = self.avatar_source;
                            *avatar = source.frames()?;
                            self.stats.avatar_loops += 1;
                            first_of(avatar, source)?
                        }
                    };
                    let background = process_main(&raw_main, &self.plan)?;
                    self.stats.avatar_frames += 1;
                    return Ok(Some(self.overlay(background, &raw_avatar)));
                }
                State::Frozen {
                    backdrop,
                    avatar,
                    pending_avatar,
                    ..
                } => {
                    if let Some(raw_avatar) = next_frame(pending_avatar, avatar)? {
                        let background = backdrop.clone();
                        self.stats.avatar_frames += 1;
                        self.stats.frozen_frames += 1;
                        return Ok(Some(self.overlay(background, &raw_avatar)));
                    }
                    if let State::Frozen {
                        main, pending_main, ..
                    } = std::mem::replace(&mut self.state, State::Done)
                    {
                        self.state = State::Playback { main, pending_main };
                    }
                }
                State::Playback { main, pending_main } => {
                    let Some(raw_main) = next_frame(pending_main, main)? else {
                        return Ok(None);
                    };
                    self.stats.playback_frames += 1;
                    return process_main(&raw_main, &self.plan).map(Some);
                }
            }
        }
    }
}

impl Iterator for FrameSequence<'_> {
    type Item = OverlayResult<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(frame)) => {
                self.stats.frames_emitted += 1;
                Some(Ok(frame))
            }
            Ok(None) => {
                if !matches!(self.state, State::Done) {
                    tracing::debug!(mode = %self.mode, stats = ?self.stats, "frame sequence finished");
                }
                self.state = State::Done;
                None
            }
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

fn next_frame(
    pending: &mut Option<RgbImage>,
    stream: &mut FrameStream<'_>,
) -> OverlayResult<Option<RgbImage>> {
    if let Some(frame) = pending.take() {
        return Ok(Some(frame));
    }
    stream.next().transpose()
}

/// Crop a main frame to `plan.crop` and rescale it back to the native size.
pub fn process_main(frame: &RgbImage, plan: &LayoutPlan) -> OverlayResult<RgbImage> {
    let size = plan.main_size;
    if frame.dimensions() != (size.width, size.height) {
        return Err(OverlayError::source(format!(
            "main frame is {}x{}, but the plan expects {size}",
            frame.width(),
            frame.height()
        )));
    }
    let crop = plan.crop;
    if crop == PixelRect::full(size) {
        return Ok(frame.clone());
    }
    let cropped = imageops::crop_imm(frame, crop.x, crop.y, crop.width, crop.height).to_image();
    Ok(imageops::resize(
        &cropped,
        size.width,
        size.height,
        FilterType::Triangle,
    ))
}

/// Scale an avatar frame to `plan.avatar_size` and key out its background.
pub fn process_avatar(frame: &RgbImage, plan: &LayoutPlan, key: &ChromaKey) -> RgbaImage {
    let target = plan.avatar_size;
    if frame.dimensions() == (target.width, target.height) {
        return extract_alpha(frame, key);
    }
    let scaled = imageops::resize(frame, target.width, target.height, FilterType::Triangle);
    extract_alpha(&scaled, key)
}

/// Composite the first avatar frame over the first main frame, as the final render would.
pub fn preview_frame(
    main_first: &RgbImage,
    avatar_first: &RgbImage,
    plan: &LayoutPlan,
    key: &ChromaKey,
) -> OverlayResult<RgbImage> {
    let background = process_main(main_first, plan)?;
    let fg = process_avatar(avatar_first, plan, key);
    Ok(composite(
        background,
        &fg,
        i64::from(plan.offset.x),
        i64::from(plan.offset.y),
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/sequencer.rs"]
mod tests;
