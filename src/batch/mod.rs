/// Batch orchestration over a set of avatar clips.
pub mod engine;
