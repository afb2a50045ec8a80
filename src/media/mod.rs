//! Video sources: `ffprobe` metadata and frame decoding.

/// `ffprobe` metadata.
pub mod probe;
/// Rewindable frame sources.
pub mod source;
