use crate::foundation::core::{Offset, PixelRect, Size};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::layout::store::ClipId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Where on the main frame an avatar may be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementZone {
    /// Touching the left edge, anywhere vertically.
    LeftEdge,
    /// Touching the bottom edge, within the left half of the frame.
    BottomLeftHalf,
    /// Touching the right edge, within the top half of the frame.
    TopRightHalf,
    /// Touching the bottom edge, anywhere horizontally.
    BottomEdge,
}

impl PlacementZone {
    /// Raw (unclamped) offset for an avatar of `avatar` size on a `main` frame.
    fn raw_offset<R: Rng + ?Sized>(self, rng: &mut R, main: Size, avatar: Size) -> Offset {
        let free_x = main.width.saturating_sub(avatar.width);
        let free_y = main.height.saturating_sub(avatar.height);
        match self {
            Self::LeftEdge => Offset {
                x: 0,
                y: rng.gen_range(0..=free_y),
            },
            Self::BottomLeftHalf => {
                let right = (main.width / 2).saturating_sub(avatar.width);
                Offset {
                    x: rng.gen_range(0..=right),
                    y: free_y,
                }
            }
            Self::TopRightHalf => {
                let bottom = (main.height / 2).saturating_sub(avatar.height);
                Offset {
                    x: free_x,
                    y: rng.gen_range(0..=bottom),
                }
            }
            Self::BottomEdge => Offset {
                x: rng.gen_range(0..=free_x),
                y: free_y,
            },
        }
    }
}

/// Randomization ranges and placement zones used when drawing plans.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayoutPolicy {
    /// Inclusive `[min, max]` crop-then-rescale factor applied to the main video.
    pub zoom_range: [f64; 2],
    /// Inclusive `[min, max]` avatar height as a fraction of the main height.
    pub avatar_height_fraction: [f64; 2],
    /// Zones drawn from uniformly.
    pub zones: Vec<PlacementZone>,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            zoom_range: [1.0, 1.2],
            avatar_height_fraction: [0.25, 1.0 / 3.0],
            zones: vec![
                PlacementZone::LeftEdge,
                PlacementZone::BottomLeftHalf,
                PlacementZone::TopRightHalf,
            ],
        }
    }
}

impl LayoutPolicy {
    pub fn validate(&self) -> OverlayResult<()> {
        let [zmin, zmax] = self.zoom_range;
        if !(zmin.is_finite() && zmax.is_finite()) || zmin < 1.0 || zmin > zmax {
            return Err(OverlayError::validation(format!(
                "zoom_range must satisfy 1.0 <= min <= max, got [{zmin}, {zmax}]"
            )));
        }
        let [fmin, fmax] = self.avatar_height_fraction;
        if !(fmin.is_finite() && fmax.is_finite()) || fmin <= 0.0 || fmin > fmax || fmax > 1.0 {
            return Err(OverlayError::validation(format!(
                "avatar_height_fraction must satisfy 0 < min <= max <= 1, got [{fmin}, {fmax}]"
            )));
        }
        if self.zones.is_empty() {
            return Err(OverlayError::validation(
                "layout policy needs at least one placement zone",
            ));
        }
        Ok(())
    }
}

/// Frozen crop/scale/placement parameters for one avatar clip.
///
/// A plan is drawn once (at preview time) and replayed unchanged by every later render of the same
/// clip.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutPlan {
    /// Main video dimensions the plan was drawn against.
    pub main_size: Size,
    pub zoom_factor: f64,
    /// Crop rectangle on the main frame, rescaled back to `main_size` when applied.
    pub crop: PixelRect,
    /// Target size of the keyed avatar.
    pub avatar_size: Size,
    /// Top-left of the avatar on the (rescaled) main frame.
    pub offset: Offset,
    pub zone: PlacementZone,
}

impl LayoutPlan {
    /// Check every geometric invariant against the current main video size.
    pub fn validate(&self, main: Size) -> OverlayResult<()> {
        if self.main_size != main {
            return Err(OverlayError::plan(format!(
                "plan was drawn for a {} main video, but the main video is {main}",
                self.main_size
            )));
        }
        if !self.zoom_factor.is_finite() || self.zoom_factor < 1.0 {
            return Err(OverlayError::plan(format!(
                "invalid zoom factor {}",
                self.zoom_factor
            )));
        }
        if !self.crop.fits_within(main) {
            return Err(OverlayError::plan(format!(
                "crop rectangle {:?} does not fit a {main} frame",
                self.crop
            )));
        }
        let placed = PixelRect {
            x: self.offset.x,
            y: self.offset.y,
            width: self.avatar_size.width,
            height: self.avatar_size.height,
        };
        if !placed.fits_within(main) {
            return Err(OverlayError::plan(format!(
                "avatar {} at ({}, {}) extends past a {main} frame",
                self.avatar_size, self.offset.x, self.offset.y
            )));
        }
        Ok(())
    }
}

/// Draws [`LayoutPlan`]s from a [`LayoutPolicy`].
#[derive(Clone, Debug, Default)]
pub struct LayoutPlanner {
    policy: LayoutPolicy,
}

impl LayoutPlanner {
    pub fn new(policy: LayoutPolicy) -> OverlayResult<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &LayoutPolicy {
        &self.policy
    }

    /// Draw one plan for an avatar with `avatar_aspect` (width / height) over a `main` frame.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        main: Size,
        avatar_aspect: f64,
    ) -> OverlayResult<LayoutPlan> {
        if main.width == 0 || main.height == 0 {
            return Err(OverlayError::validation(format!(
                "main frame size must be non-zero, got {main}"
            )));
        }
        if !avatar_aspect.is_finite() || avatar_aspect <= 0.0 {
            return Err(OverlayError::validation(format!(
                "avatar aspect ratio must be positive, got {avatar_aspect}"
            )));
        }

        let [zmin, zmax] = self.policy.zoom_range;
        let zoom_factor = rng.gen_range(zmin..=zmax);
        let crop_w = floor_clamp(f64::from(main.width) / zoom_factor, main.width);
        let crop_h = floor_clamp(f64::from(main.height) / zoom_factor, main.height);
        let crop = PixelRect {
            x: rng.gen_range(0..=main.width - crop_w),
            y: rng.gen_range(0..=main.height - crop_h),
            width: crop_w,
            height: crop_h,
        };

        let [fmin, fmax] = self.policy.avatar_height_fraction;
        let main_h = f64::from(main.height);
        let target_h = rng.gen_range(main_h * fmin..=main_h * fmax);
        let avatar_size = fit_avatar(main, target_h, avatar_aspect);

        let zone = *self
            .policy
            .zones
            .choose(rng)
            .ok_or_else(|| OverlayError::validation("layout policy has no placement zones"))?;
        let raw = zone.raw_offset(rng, main, avatar_size);
        let offset = Offset {
            x: raw.x.min(main.width - avatar_size.width),
            y: raw.y.min(main.height - avatar_size.height),
        };

        Ok(LayoutPlan {
            main_size: main,
            zoom_factor,
            crop,
            avatar_size,
            offset,
            zone,
        })
    }
}

fn floor_clamp(v: f64, max: u32) -> u32 {
    (v.floor() as u32).clamp(1, max)
}

/// Integer avatar size for a target height, shrunk to fit the main frame when too wide.
fn fit_avatar(main: Size, target_h: f64, aspect: f64) -> Size {
    let mut height = floor_clamp(target_h, main.height);
    let mut width = ((f64::from(height) * aspect).floor() as u32).max(1);
    if width > main.width {
        width = main.width;
        height = floor_clamp(f64::from(width) / aspect, main.height);
    }
    Size { width, height }
}

/// RNG for planning `clip`.
///
/// With a batch seed the stream depends only on `(seed, clip)`, so replanning reproduces the same
/// layout in another process.
pub fn clip_rng(seed: Option<u64>, clip: &ClipId) -> StdRng {
    match seed {
        Some(seed) => {
            let derived = xxhash_rust::xxh3::xxh3_64_with_seed(clip.as_str().as_bytes(), seed);
            StdRng::seed_from_u64(derived)
        }
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/planner.rs"]
mod tests;
