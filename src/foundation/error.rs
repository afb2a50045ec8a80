/// Result alias used throughout the crate.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Error taxonomy for preview, planning and rendering.
#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    /// Malformed input, configuration or dimensions.
    #[error("validation error: {0}")]
    Validation(String),

    /// A video could not be opened, probed or read.
    #[error("source error: {0}")]
    Source(String),

    /// A render was requested without a matching committed layout plan.
    #[error("plan error: {0}")]
    Plan(String),

    /// The encoder or muxer failed or produced no output.
    #[error("encode error: {0}")]
    Encode(String),

    /// Plan or config (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// The batch was cancelled before this clip started.
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OverlayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for failures that are recorded against one clip while the batch continues.
    pub fn is_clip_recoverable(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Encode(_) | Self::Other(_))
    }
}
