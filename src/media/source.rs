use crate::encode::ffmpeg::FfmpegTools;
use crate::foundation::core::{Fps, Size};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::media::probe::{VideoInfo, probe_video};
use image::RgbImage;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;

/// Lazily decoded frames, in presentation order.
pub type FrameStream<'a> = Box<dyn Iterator<Item = OverlayResult<RgbImage>> + Send + 'a>;

/// A video that can be decoded from its first frame any number of times.
pub trait VideoSource: Send + Sync {
    /// Metadata captured when the source was opened.
    fn info(&self) -> &VideoInfo;

    /// Open a fresh stream positioned at the first frame.
    fn frames(&self) -> OverlayResult<FrameStream<'_>>;

    /// Decode only the first frame.
    fn first_frame(&self) -> OverlayResult<RgbImage> {
        self.frames()?.next().unwrap_or_else(|| {
            Err(OverlayError::source(format!(
                "no readable frame in '{}'",
                self.info().path.display()
            )))
        })
    }
}

/// Opens [`VideoSource`]s by path.
pub trait SourceProvider: Send + Sync {
    fn open(&self, path: &Path) -> OverlayResult<Arc<dyn VideoSource>>;
}

/// Source decoded by a system `ffmpeg` process writing raw RGB24 frames to a pipe.
#[derive(Clone, Debug)]
pub struct FfmpegVideoSource {
    info: VideoInfo,
    tools: FfmpegTools,
}

impl FfmpegVideoSource {
    /// Probe `path` and prepare it for decoding.
    pub fn open(tools: &FfmpegTools, path: &Path) -> OverlayResult<Self> {
        let info = probe_video(tools, path)?;
        Ok(Self {
            info,
            tools: tools.clone(),
        })
    }

    fn spawn_decoder(&self, max_frames: Option<u64>) -> OverlayResult<FfmpegFrameReader> {
        let mut cmd = Command::new(&self.tools.ffmpeg);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.info.path)
            .args(["-map", "0:v:0", "-an"]);
        if let Some(n) = max_frames {
            cmd.args(["-frames:v", &n.to_string()]);
        }
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            OverlayError::source(format!(
                "failed to spawn ffmpeg decoder (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OverlayError::source("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| OverlayError::source("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(FfmpegFrameReader {
            path: self.info.path.clone(),
            size: self.info.size,
            child: Some(child),
            stdout: Some(stdout),
            stderr_drain: Some(stderr_drain),
        })
    }
}

impl VideoSource for FfmpegVideoSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frames(&self) -> OverlayResult<FrameStream<'_>> {
        Ok(Box::new(self.spawn_decoder(None)?))
    }

    fn first_frame(&self) -> OverlayResult<RgbImage> {
        let mut reader = self.spawn_decoder(Some(1))?;
        reader.next().unwrap_or_else(|| {
            Err(OverlayError::source(format!(
                "no readable frame in '{}'",
                self.info.path.display()
            )))
        })
    }
}

struct FfmpegFrameReader {
    path: PathBuf,
    size: Size,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegFrameReader {
    fn read_frame(&mut self) -> OverlayResult<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let frame_len = self.size.area() as usize * 3;
        let mut buf = vec![0u8; frame_len];
        let mut filled = 0usize;
        while filled < frame_len {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(OverlayError::source(format!(
                        "failed reading decoded frames of '{}': {e}",
                        self.path.display()
                    )));
                }
            }
        }

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < frame_len {
            return Err(OverlayError::source(format!(
                "truncated frame from '{}': got {filled} of {frame_len} bytes",
                self.path.display()
            )));
        }

        RgbImage::from_raw(self.size.width, self.size.height, buf)
            .map(Some)
            .ok_or_else(|| OverlayError::source("decoded frame buffer size mismatch"))
    }

    /// Reap the decoder after a clean end of stream.
    fn finish(&mut self) -> OverlayResult<()> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| {
            OverlayError::source(format!("failed to wait for ffmpeg decoder: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| OverlayError::source("ffmpeg stderr drain thread panicked"))?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        if !status.success() {
            return Err(OverlayError::source(format!(
                "ffmpeg decoder for '{}' exited with status {}: {}",
                self.path.display(),
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

impl Iterator for FfmpegFrameReader {
    type Item = OverlayResult<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.abort();
                Some(Err(e))
            }
        }
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Opens every path with [`FfmpegVideoSource`].
#[derive(Clone, Debug, Default)]
pub struct FfmpegSourceProvider {
    tools: FfmpegTools,
}

impl FfmpegSourceProvider {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }
}

impl SourceProvider for FfmpegSourceProvider {
    fn open(&self, path: &Path) -> OverlayResult<Arc<dyn VideoSource>> {
        Ok(Arc::new(FfmpegVideoSource::open(&self.tools, path)?))
    }
}

/// Video held in memory; used for tests and for callers that decode frames themselves.
#[derive(Clone, Debug)]
pub struct MemoryVideoSource {
    info: VideoInfo,
    frames: Arc<Vec<RgbImage>>,
}

impl MemoryVideoSource {
    /// Build a source from frames that all share `size`.
    pub fn new(
        name: impl Into<PathBuf>,
        size: Size,
        fps: Fps,
        frames: Vec<RgbImage>,
    ) -> OverlayResult<Self> {
        if let Some(bad) = frames
            .iter()
            .find(|f| f.dimensions() != (size.width, size.height))
        {
            return Err(OverlayError::validation(format!(
                "memory source frame is {}x{}, expected {size}",
                bad.width(),
                bad.height()
            )));
        }
        let info = VideoInfo {
            path: name.into(),
            size,
            fps,
            has_audio: false,
            frame_count: Some(frames.len() as u64),
            duration_secs: Some(fps.frames_to_secs(frames.len() as u64)),
        };
        Ok(Self {
            info,
            frames: Arc::new(frames),
        })
    }

    /// Mark the source as carrying an audio track.
    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.info.has_audio = has_audio;
        self
    }
}

impl VideoSource for MemoryVideoSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frames(&self) -> OverlayResult<FrameStream<'_>> {
        Ok(Box::new(
            self.frames.iter().cloned().map(Ok::<RgbImage, OverlayError>),
        ))
    }
}

/// Resolves paths against a fixed set of [`MemoryVideoSource`]s.
#[derive(Clone, Debug, Default)]
pub struct MemorySourceProvider {
    sources: BTreeMap<PathBuf, Arc<MemoryVideoSource>>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: MemoryVideoSource) {
        self.sources.insert(path.into(), Arc::new(source));
    }
}

impl SourceProvider for MemorySourceProvider {
    fn open(&self, path: &Path) -> OverlayResult<Arc<dyn VideoSource>> {
        let source = self.sources.get(path).ok_or_else(|| {
            OverlayError::source(format!("could not open video '{}'", path.display()))
        })?;
        Ok(source.clone())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
