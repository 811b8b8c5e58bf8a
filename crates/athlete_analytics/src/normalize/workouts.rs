use std::collections::{HashMap, HashSet};

use super::{Normalizer, retain_indices};
use crate::records::{NormalizedWorkout, WorkoutRecord};

/// Training load for one session; a missing duration or RPE counts as zero.
pub fn training_load(duration_minutes: Option<f64>, rpe: Option<f64>) -> f64 {
    duration_minutes.unwrap_or(0.0) * rpe.unwrap_or(0.0)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WorkoutNormalizer;

impl Normalizer for WorkoutNormalizer {
    type Input = WorkoutRecord;
    type Output = NormalizedWorkout;

    /// Deduplicate by workout id keeping the latest `updated_at` (the later
    /// row wins a tie), then derive training load. Survivors keep their input
    /// position.
    fn normalize(&self, rows: Vec<WorkoutRecord>) -> Vec<NormalizedWorkout> {
        let mut latest: HashMap<Option<&str>, usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            latest
                .entry(row.workout_id.as_deref())
                .and_modify(|best| {
                    if row.updated_at >= rows[*best].updated_at {
                        *best = idx;
                    }
                })
                .or_insert(idx);
        }
        let keep: HashSet<usize> = latest.into_values().collect();

        retain_indices(rows, &keep)
            .into_iter()
            .map(|record| NormalizedWorkout {
                training_load: training_load(record.duration_minutes, record.rpe),
                record,
            })
            .collect()
    }
}
