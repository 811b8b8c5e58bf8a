//! Joins the normalized sources into the workout session fact table.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::records::{FactWorkoutSession, NormalizedFeedback, NormalizedWearable, NormalizedWorkout};

/// Feedback columns carried into the fact table.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FeedbackProjection {
    energy_level: Option<f64>,
    soreness: Option<f64>,
    mood_score: u8,
}

/// Left-join workouts to wearables on (athlete id, workout date = sample
/// date), then to feedback on workout id.
///
/// Every workout yields exactly one fact row, in workout order. When more
/// than one wearable or feedback row matches a key, the last one in its
/// input wins.
pub fn merge(
    workouts: &[NormalizedWorkout],
    wearables: &[NormalizedWearable],
    feedback: &[NormalizedFeedback],
) -> Vec<FactWorkoutSession> {
    let health: HashMap<(&str, NaiveDate), &NormalizedWearable> = wearables
        .iter()
        .map(|w| ((w.record.athlete_id.as_str(), w.record.sample_date), w))
        .collect();

    let forms: HashMap<&str, FeedbackProjection> = feedback
        .iter()
        .filter_map(|f| {
            let workout_id = f.record.workout_id.as_deref()?;
            Some((
                workout_id,
                FeedbackProjection {
                    energy_level: f.record.energy_level,
                    soreness: f.record.soreness,
                    mood_score: f.mood_score,
                },
            ))
        })
        .collect();

    workouts
        .iter()
        .map(|w| {
            let workout = &w.record;
            let wearable = health
                .get(&(workout.athlete_id.as_str(), workout.workout_date))
                .copied();
            let form = workout
                .workout_id
                .as_deref()
                .and_then(|id| forms.get(id))
                .copied();

            FactWorkoutSession {
                workout_id: workout.workout_id.clone(),
                athlete_id: workout.athlete_id.clone(),
                program_id: workout.program_id.clone(),
                workout_date: workout.workout_date,
                duration_minutes: workout.duration_minutes,
                rpe: workout.rpe,
                updated_at: workout.updated_at,
                training_load: w.training_load,

                sample_date_health: wearable.map(|h| h.record.sample_date),
                hrv: wearable.and_then(|h| h.record.hrv),
                resting_hr: wearable.and_then(|h| h.record.resting_hr),
                sleep_score: wearable.and_then(|h| h.record.sleep_score),
                step_count: wearable.and_then(|h| h.record.step_count),
                calories_burned: wearable.and_then(|h| h.record.calories_burned),
                source_system: wearable.and_then(|h| h.record.source_system.clone()),
                ingested_at_health: wearable.map(|h| h.record.ingested_at),
                recovery_status: wearable.and_then(|h| h.recovery_status),

                energy_level: form.and_then(|f| f.energy_level),
                soreness: form.and_then(|f| f.soreness),
                mood_score: form.map(|f| f.mood_score),
            }
        })
        .collect()
}
