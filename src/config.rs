use crate::effects::chroma_key::ChromaKey;
use crate::encode::ffmpeg::FfmpegTools;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::layout::planner::LayoutPolicy;
use std::path::{Path, PathBuf};

/// Engine configuration, loadable from JSON. Every field has a default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where preview stills are written.
    pub preview_dir: PathBuf,
    /// Where generated videos are written; must differ from `preview_dir`.
    pub output_dir: PathBuf,
    /// Scratch directory for silent intermediates.
    pub work_dir: PathBuf,
    pub layout: LayoutPolicy,
    pub chroma_key: ChromaKey,
    /// Batch seed; `None` draws every plan from entropy.
    pub seed: Option<u64>,
    pub tools: FfmpegTools,
    pub overwrite: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_dir: PathBuf::from("generated_previews"),
            output_dir: PathBuf::from("generated_videos"),
            work_dir: std::env::temp_dir().join("overlayer"),
            layout: LayoutPolicy::default(),
            chroma_key: ChromaKey::default(),
            seed: None,
            tools: FfmpegTools::default(),
            overwrite: true,
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file.
    pub fn from_path(path: &Path) -> OverlayResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text).map_err(|e| {
            OverlayError::serde(format!("config '{}' parse failed: {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.output_dir == self.preview_dir {
            return Err(OverlayError::validation(format!(
                "output_dir and preview_dir must differ (both '{}')",
                self.output_dir.display()
            )));
        }
        self.layout.validate()?;
        self.chroma_key.validate()?;
        Ok(())
    }
}
