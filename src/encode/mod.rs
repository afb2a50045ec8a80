/// Silent H.264 output through a system `ffmpeg`.
pub mod ffmpeg;
/// External audio-aware muxer boundary.
pub mod mux;
/// Frame sink contract.
pub mod sink;
