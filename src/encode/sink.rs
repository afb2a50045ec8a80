use crate::foundation::core::{Fps, FrameIndex, Size};
use crate::foundation::error::{OverlayError, OverlayResult};
use image::RgbImage;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output dimensions.
    pub size: Size,
    /// Output frames-per-second.
    pub fps: Fps,
}

/// Sink contract for consuming composited frames in output order.
///
/// Ordering contract: `push_frame` is called with strictly increasing `FrameIndex` values starting
/// at 0.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> OverlayResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> OverlayResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> OverlayResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    ended: bool,
    /// Frames in output order.
    pub(crate) frames: Vec<(FrameIndex, RgbImage)>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, RgbImage)] {
        &self.frames
    }

    /// Return `true` once `end` has been called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> OverlayResult<()> {
        self.cfg = Some(cfg);
        self.ended = false;
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> OverlayResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| OverlayError::encode("in-memory sink not started"))?;
        if frame.dimensions() != (cfg.size.width, cfg.size.height) {
            return Err(OverlayError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}",
                frame.width(),
                frame.height(),
                cfg.size
            )));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> OverlayResult<()> {
        self.ended = true;
        Ok(())
    }
}
