//! Per-athlete rolling metrics over the fact table.
//!
//! The trailing window is a row-count window over each athlete's fact rows
//! in the order they arrive, not a calendar window: `training_load_7d` sums
//! the last seven sessions present in the batch however many days they span.

use chrono::{DateTime, Utc};

use crate::records::{AthleteMetric, FactWorkoutSession};
use crate::window;

pub const TRAILING_ROWS: usize = 7;

/// One metric row per athlete, ordered by athlete id.
pub fn aggregate(facts: &[FactWorkoutSession], run_time: DateTime<Utc>) -> Vec<AthleteMetric> {
    window::group_indices(facts, |f| f.athlete_id.as_str())
        .into_iter()
        .map(|(athlete_id, indices)| {
            let rows: Vec<&FactWorkoutSession> = indices.iter().map(|&i| &facts[i]).collect();
            let recent = window::tail(&rows, TRAILING_ROWS);

            let rpe: Vec<f64> = rows.iter().filter_map(|f| f.rpe).collect();
            let hrv: Vec<f64> = recent.iter().filter_map(|f| f.hrv).collect();

            AthleteMetric {
                athlete_id: athlete_id.to_string(),
                rpe_avg: window::mean(&rpe),
                training_load_7d: recent.iter().map(|f| f.training_load).sum(),
                hrv_trend: window::mean(&hrv),
                generated_at: run_time,
            }
        })
        .collect()
}
