#![forbid(unsafe_code)]

//! Avatar-overlay video compositing.
//!
//! A green-screen avatar clip is keyed, placed on a main video according to a reproducible
//! [`LayoutPlan`], previewed as a still, and later rendered into a full video in either
//! [`AssemblyMode::Parallel`] or [`AssemblyMode::Sequential`] with audio re-attached by an external
//! muxer.
//!
//! The usual entry point is [`OverlayEngine`]: `generate_previews` draws and commits one plan per
//! avatar clip, `generate_videos` replays those plans unchanged.

pub mod batch;
pub mod config;
pub mod effects;
pub mod encode;
pub mod foundation;
pub mod layout;
pub mod media;
pub mod sequence;
pub mod session;

pub use batch::engine::{
    CancelToken, ClipReport, OverlayEngine, PreviewOutput, PreviewSet, preview_file_name,
    video_file_name,
};
pub use config::EngineConfig;
pub use effects::chroma_key::{ChromaKey, Hsv8, extract_alpha, rgb_to_hsv8};
pub use effects::composite::{composite, composite_in_place};
pub use encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, FfmpegTools};
pub use encode::mux::{AudioTrack, AudioTreatment, CommandOutcome, FfmpegMuxer, MuxRequest, Muxer};
pub use encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use foundation::core::{Fps, FrameIndex, Offset, PixelRect, Size};
pub use foundation::error::{OverlayError, OverlayResult};
pub use layout::planner::{LayoutPlan, LayoutPlanner, LayoutPolicy, PlacementZone, clip_rng};
pub use layout::store::{ClipId, PlanStore};
pub use media::probe::{VideoInfo, probe_video};
pub use media::source::{
    FfmpegSourceProvider, FfmpegVideoSource, FrameStream, MemorySourceProvider, MemoryVideoSource,
    SourceProvider, VideoSource,
};
pub use sequence::sequencer::{AssemblyMode, FrameSequence, FrameSequencer, SequenceStats};
pub use session::render_session::{
    RenderJob, RenderOutput, RenderSession, RenderSessionOpts, SinkFactory, ffmpeg_sink_factory,
};
