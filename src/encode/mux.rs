use crate::encode::ffmpeg::{FfmpegTools, ensure_parent_dir};
use crate::foundation::error::{OverlayError, OverlayResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Sample rate used for resampled tracks and substituted silence.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// How the audio tracks of a [`MuxRequest`] are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioTreatment {
    /// Equal-weight mix; the result lasts as long as the first track.
    MixFirst,
    /// Tracks play back to back in request order.
    Concat,
}

/// One audio input of a mux.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    /// Video or audio file whose first audio stream is used.
    pub source: PathBuf,
    /// When `false`, silence of `span_secs` is substituted for the track.
    pub has_audio: bool,
    /// Seconds of output this track covers.
    pub span_secs: f64,
}

/// A silent video plus the audio to attach to it.
#[derive(Clone, Debug, PartialEq)]
pub struct MuxRequest {
    pub video: PathBuf,
    /// Exact duration of `video`; the final audio is padded or trimmed to it.
    pub video_secs: f64,
    pub treatment: AudioTreatment,
    pub tracks: Vec<AudioTrack>,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

/// Structured result of an external tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured diagnostic output, kept verbatim.
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Combines a silent video with audio into a finished file.
pub trait Muxer: Send + Sync {
    /// Produce `req.out_path`; `Ok` only when the tool succeeded and the output is non-empty.
    fn mux(&self, req: &MuxRequest) -> OverlayResult<CommandOutcome>;
}

/// [`Muxer`] backed by a system `ffmpeg`.
#[derive(Clone, Debug, Default)]
pub struct FfmpegMuxer {
    tools: FfmpegTools,
}

impl FfmpegMuxer {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, req: &MuxRequest) -> OverlayResult<CommandOutcome> {
        let args = build_mux_args(req)?;
        ensure_parent_dir(&req.out_path)?;
        // A refused overwrite leaves the file that caused the refusal alone.
        let owned = req.overwrite || !req.out_path.exists();
        let mut partial = PartialOutput(owned.then_some(req.out_path.as_path()));
        tracing::debug!(?args, "running ffmpeg mux");

        let out = Command::new(&self.tools.ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| {
                OverlayError::encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        let outcome = CommandOutcome {
            code: out.status.code(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };
        if !outcome.success() {
            return Err(OverlayError::encode(format!(
                "ffmpeg mux exited with status {}: {}",
                out.status,
                outcome.stderr.trim()
            )));
        }
        check_output(&req.out_path)?;
        partial.0 = None;
        Ok(outcome)
    }
}

/// Removes a mux output on drop unless it was disarmed after passing [`check_output`].
struct PartialOutput<'a>(Option<&'a Path>);

impl Drop for PartialOutput<'_> {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "removing unfinished mux output");
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

/// Fail unless `path` is a non-empty file.
pub fn check_output(path: &Path) -> OverlayResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(OverlayError::encode(format!(
            "muxer produced an empty output '{}'",
            path.display()
        ))),
        Err(e) => Err(OverlayError::encode(format!(
            "muxer output '{}' is missing: {e}",
            path.display()
        ))),
    }
}

/// Build the full `ffmpeg` argument vector for `req`.
///
/// Input 0 is the silent video; input `i + 1` is track `i`, or a generated silent source when the
/// track has no audio. The video stream is copied, never re-encoded.
pub fn build_mux_args(req: &MuxRequest) -> OverlayResult<Vec<OsString>> {
    if req.tracks.is_empty() {
        return Err(OverlayError::validation("mux request has no audio tracks"));
    }
    if !req.video_secs.is_finite() || req.video_secs <= 0.0 {
        return Err(OverlayError::validation(format!(
            "mux video duration must be positive, got {}",
            req.video_secs
        )));
    }
    if let Some(bad) = req
        .tracks
        .iter()
        .find(|t| !t.span_secs.is_finite() || t.span_secs < 0.0)
    {
        return Err(OverlayError::validation(format!(
            "audio span for '{}' must be non-negative, got {}",
            bad.source.display(),
            bad.span_secs
        )));
    }

    let overwrite = if req.overwrite { "-y" } else { "-n" };
    let mut args: Vec<OsString> = vec![overwrite.into()];
    for a in ["-v", "error", "-nostdin", "-i"] {
        args.push(a.into());
    }
    args.push(req.video.clone().into_os_string());

    for track in &req.tracks {
        if track.has_audio {
            args.push("-i".into());
            args.push(track.source.clone().into_os_string());
        } else {
            args.push("-f".into());
            args.push("lavfi".into());
            args.push("-t".into());
            args.push(secs(track.span_secs).into());
            args.push("-i".into());
            args.push(format!("anullsrc=r={MIX_SAMPLE_RATE}:cl=stereo").into());
        }
    }

    args.push("-filter_complex".into());
    args.push(filter_graph(req).into());
    for a in [
        "-map",
        "0:v:0",
        "-map",
        "[aout]",
        "-c:v",
        "copy",
        "-c:a",
        "aac",
        "-movflags",
        "+faststart",
    ] {
        args.push(a.into());
    }
    args.push(req.out_path.clone().into_os_string());
    Ok(args)
}

fn filter_graph(req: &MuxRequest) -> String {
    let n = req.tracks.len();
    let mut chains: Vec<String> = Vec::with_capacity(n + 2);
    for (i, track) in req.tracks.iter().enumerate() {
        let mut chain = format!(
            "[{}:a:0]aresample={MIX_SAMPLE_RATE},aformat=sample_fmts=fltp:channel_layouts=stereo",
            i + 1
        );
        if req.treatment == AudioTreatment::Concat {
            // Each segment must cover exactly its span for later ones to line up.
            chain.push_str(&format!(",apad,atrim=duration={}", secs(track.span_secs)));
        }
        chain.push_str(&format!("[a{i}]"));
        chains.push(chain);
    }

    let labels: String = (0..n).map(|i| format!("[a{i}]")).collect();
    let combined = match (req.treatment, n) {
        (_, 1) => "[a0]".to_string(),
        (AudioTreatment::MixFirst, _) => {
            chains.push(format!(
                "{labels}amix=inputs={n}:duration=first:dropout_transition=0[mix]"
            ));
            "[mix]".to_string()
        }
        (AudioTreatment::Concat, _) => {
            chains.push(format!("{labels}concat=n={n}:v=0:a=1[cat]"));
            "[cat]".to_string()
        }
    };
    chains.push(format!(
        "{combined}apad,atrim=duration={}[aout]",
        secs(req.video_secs)
    ));
    chains.join(";")
}

fn secs(v: f64) -> String {
    format!("{v:.6}")
}

#[cfg(test)]
#[path = "../../tests/unit/encode/mux.rs"]
mod tests;
