use crate::foundation::error::{OverlayError, OverlayResult};
use crate::layout::planner::LayoutPlan;
use anyhow::Context as _;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Identity of an avatar clip: the file stem of its source path.
///
/// Output names (previews, videos) and committed plans are keyed by this value.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(name: impl Into<String>) -> OverlayResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(OverlayError::validation("clip id must be non-empty"));
        }
        if name.contains(['/', '\\']) {
            return Err(OverlayError::validation(format!(
                "clip id '{name}' must not contain path separators"
            )));
        }
        Ok(Self(name))
    }

    /// Derive the clip id from an avatar video path.
    pub fn from_path(path: &Path) -> OverlayResult<Self> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                OverlayError::validation(format!(
                    "avatar path '{}' has no file name",
                    path.display()
                ))
            })?;
        Self::new(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive clip ids for a batch, rejecting two paths that would share output names.
pub fn clip_ids(avatar_paths: &[PathBuf]) -> OverlayResult<Vec<ClipId>> {
    let mut seen = BTreeMap::<ClipId, &Path>::new();
    let mut ids = Vec::with_capacity(avatar_paths.len());
    for path in avatar_paths {
        let id = ClipId::from_path(path)?;
        if let Some(prev) = seen.insert(id.clone(), path) {
            return Err(OverlayError::validation(format!(
                "avatar clips '{}' and '{}' share the name '{id}'",
                prev.display(),
                path.display()
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

const STORE_VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize)]
struct StoreFile {
    version: u32,
    plans: BTreeMap<ClipId, LayoutPlan>,
}

/// Committed layout plans keyed by clip.
///
/// Plans are inserted by previews and only read by renders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanStore {
    plans: BTreeMap<ClipId, LayoutPlan>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key an ordered plan list by the avatar paths it was produced for.
    ///
    /// The list must cover every avatar path; extra plans are ignored.
    pub fn from_ordered(avatar_paths: &[PathBuf], plans: &[LayoutPlan]) -> OverlayResult<Self> {
        if plans.len() < avatar_paths.len() {
            return Err(OverlayError::plan(format!(
                "{} avatar clips but only {} layout plans; run previews first",
                avatar_paths.len(),
                plans.len()
            )));
        }
        let ids = clip_ids(avatar_paths)?;
        let plans = ids.into_iter().zip(plans.iter().cloned()).collect();
        Ok(Self { plans })
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn get(&self, clip: &ClipId) -> Option<&LayoutPlan> {
        self.plans.get(clip)
    }

    /// Look up the committed plan for `clip`, failing with a plan error when absent.
    pub fn require(&self, clip: &ClipId) -> OverlayResult<&LayoutPlan> {
        self.plans.get(clip).ok_or_else(|| {
            OverlayError::plan(format!(
                "no committed layout plan for avatar clip '{clip}'; run previews first"
            ))
        })
    }

    /// Commit `plan` for `clip`, replacing any earlier plan.
    pub fn commit(&mut self, clip: ClipId, plan: LayoutPlan) -> Option<LayoutPlan> {
        self.plans.insert(clip, plan)
    }

    /// Merge every plan from `other`, letting `other` win on conflicts.
    pub fn extend(&mut self, other: PlanStore) {
        self.plans.extend(other.plans);
    }

    pub fn clear(&mut self) {
        self.plans.clear();
    }

    pub fn to_json(&self) -> OverlayResult<String> {
        let file = StoreFile {
            version: STORE_VERSION,
            plans: self.plans.clone(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| OverlayError::serde(e.to_string()))
    }

    pub fn from_json(json: &str) -> OverlayResult<Self> {
        let file: StoreFile =
            serde_json::from_str(json).map_err(|e| OverlayError::serde(e.to_string()))?;
        if file.version != STORE_VERSION {
            return Err(OverlayError::serde(format!(
                "unsupported plan store version {} (expected {STORE_VERSION})",
                file.version
            )));
        }
        Ok(Self { plans: file.plans })
    }

    pub fn load(path: &Path) -> OverlayResult<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plan store '{}'", path.display()))?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> OverlayResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write plan store '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/store.rs"]
mod tests;
