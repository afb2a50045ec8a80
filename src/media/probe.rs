use crate::encode::ffmpeg::FfmpegTools;
use crate::foundation::core::{Fps, Size};
use crate::foundation::error::{OverlayError, OverlayResult};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq)]
/// Basic metadata about a source video.
pub struct VideoInfo {
    /// Source path (or a synthetic name for in-memory sources).
    pub path: PathBuf,
    /// Frame dimensions.
    pub size: Size,
    /// Native frame rate.
    pub fps: Fps,
    /// Whether at least one audio stream is present.
    pub has_audio: bool,
    /// Frame count reported by the container, if any.
    pub frame_count: Option<u64>,
    /// Container duration in seconds, if reported.
    pub duration_secs: Option<f64>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(serde::Deserialize, Default)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

/// Probe source video metadata through `ffprobe`.
pub fn probe_video(tools: &FfmpegTools, source_path: &Path) -> OverlayResult<VideoInfo> {
    if !source_path.is_file() {
        return Err(OverlayError::source(format!(
            "video '{}' does not exist or is not a file",
            source_path.display()
        )));
    }

    let out = std::process::Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| OverlayError::source(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(OverlayError::source(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    parse_probe_json(source_path, &out.stdout)
}

fn parse_probe_json(source_path: &Path, json: &[u8]) -> OverlayResult<VideoInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| OverlayError::source(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            OverlayError::source(format!(
                "no video stream found in '{}'",
                source_path.display()
            ))
        })?;

    let width = video
        .width
        .ok_or_else(|| OverlayError::source("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| OverlayError::source("missing video height from ffprobe"))?;
    let size = Size::new(width, height).map_err(|e| OverlayError::source(e.to_string()))?;

    // Some containers report r_frame_rate as 0/0; fall back to the average rate.
    let fps = [video.r_frame_rate.as_deref(), video.avg_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|r| Fps::parse(r).ok())
        .ok_or_else(|| {
            OverlayError::source(format!(
                "could not determine frame rate of '{}'",
                source_path.display()
            ))
        })?;

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let frame_count = video.nb_frames.as_deref().and_then(|n| n.parse().ok());
    let duration_secs = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok());

    Ok(VideoInfo {
        path: source_path.to_path_buf(),
        size,
        fps,
        has_audio,
        frame_count,
        duration_secs,
    })
}
