//! Data-quality gate applied to the fact table before anything is written.

use thiserror::Error;

use crate::records::FactWorkoutSession;

pub const RPE_MIN: f64 = 0.0;
pub const RPE_MAX: f64 = 10.0;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("fact row {row} has a null workout_id")]
    NullWorkoutId { row: usize },
    #[error("rpe {rpe} out of expected range 0-10 for workout {workout_id}")]
    RpeOutOfRange { workout_id: String, rpe: f64 },
}

/// Reject the batch on the first violated invariant. A missing RPE is not a
/// violation; only present values are range checked.
pub fn validate(facts: &[FactWorkoutSession]) -> Result<(), ValidationError> {
    if let Some(row) = facts.iter().position(|f| f.workout_id.is_none()) {
        return Err(ValidationError::NullWorkoutId { row });
    }
    for fact in facts {
        if let Some(rpe) = fact.rpe {
            if !(RPE_MIN..=RPE_MAX).contains(&rpe) {
                return Err(ValidationError::RpeOutOfRange {
                    workout_id: fact.workout_id.clone().unwrap_or_default(),
                    rpe,
                });
            }
        }
    }
    Ok(())
}
