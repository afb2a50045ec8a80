/// Randomized, reproducible crop/scale/placement planning.
pub mod planner;
/// Committed plans keyed by avatar clip.
pub mod store;
