//! Per-frame pixel operations: green-screen keying and alpha compositing.

/// Chroma key extraction (RGB -> straight-alpha RGBA).
pub mod chroma_key;
/// Alpha compositing of keyed overlays onto opaque frames.
pub mod composite;
