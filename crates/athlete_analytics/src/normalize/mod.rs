//! Per-source normalization.
//!
//! Each normalizer is a stateless transform over one source's batch:
//! - [`WorkoutNormalizer`]: last-writer-wins dedup and training load
//! - [`WearableNormalizer`]: dedup per athlete-day and recovery status
//! - [`FeedbackNormalizer`]: mood scoring and dedup per form

mod feedback;
mod wearables;
mod workouts;

pub use feedback::{DEFAULT_MOOD_SCORE, FeedbackNormalizer, mood_score};
pub use wearables::WearableNormalizer;
pub use workouts::{WorkoutNormalizer, training_load};

/// A pure transform from one source's raw rows to their normalized form.
pub trait Normalizer {
    type Input;
    type Output;

    fn normalize(&self, rows: Vec<Self::Input>) -> Vec<Self::Output>;
}

/// Keep the rows whose index is in `keep`, preserving input order.
fn retain_indices<T>(rows: Vec<T>, keep: &std::collections::HashSet<usize>) -> Vec<T> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(idx, row)| keep.contains(&idx).then_some(row))
        .collect()
}
