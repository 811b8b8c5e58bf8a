//! Row types for the raw sources, their normalized forms and the job outputs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Source;
use crate::recovery::RecoveryStatus;

/// A raw row carrying the timestamp its source is watermarked on.
pub trait RawRecord {
    const SOURCE: Source;

    fn watermark_value(&self) -> DateTime<Utc>;
}

/// Row of `workouts.parquet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub workout_id: Option<String>,
    pub athlete_id: String,
    pub program_id: Option<String>,
    pub workout_date: NaiveDate,
    pub duration_minutes: Option<f64>,
    pub rpe: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl RawRecord for WorkoutRecord {
    const SOURCE: Source = Source::Workouts;

    fn watermark_value(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Row of `wearables_daily.parquet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WearableRecord {
    pub athlete_id: String,
    pub sample_date: NaiveDate,
    pub hrv: Option<f64>,
    pub resting_hr: Option<f64>,
    pub sleep_score: Option<f64>,
    pub step_count: Option<i64>,
    pub calories_burned: Option<f64>,
    pub source_system: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl RawRecord for WearableRecord {
    const SOURCE: Source = Source::Wearables;

    fn watermark_value(&self) -> DateTime<Utc> {
        self.ingested_at
    }
}

/// Row of `feedback_forms.parquet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub feedback_id: String,
    pub workout_id: Option<String>,
    pub athlete_id: String,
    pub mood: Option<String>,
    pub energy_level: Option<f64>,
    pub soreness: Option<f64>,
    pub submitted_at: DateTime<Utc>,
}

impl RawRecord for FeedbackRecord {
    const SOURCE: Source = Source::Feedback;

    fn watermark_value(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWorkout {
    #[serde(flatten)]
    pub record: WorkoutRecord,
    /// `duration_minutes * rpe`, missing inputs counted as zero.
    pub training_load: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWearable {
    #[serde(flatten)]
    pub record: WearableRecord,
    pub recovery_status: Option<RecoveryStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeedback {
    #[serde(flatten)]
    pub record: FeedbackRecord,
    pub mood_score: u8,
}

/// One workout joined with its same-day wearable sample and its feedback.
///
/// Wearable fields are null when no sample matched; feedback fields are null
/// when no form referenced the workout. The wearable's date-like columns carry
/// a `_health` suffix so they never shadow the workout's own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactWorkoutSession {
    pub workout_id: Option<String>,
    pub athlete_id: String,
    pub program_id: Option<String>,
    pub workout_date: NaiveDate,
    pub duration_minutes: Option<f64>,
    pub rpe: Option<f64>,
    pub updated_at: DateTime<Utc>,
    pub training_load: f64,

    pub sample_date_health: Option<NaiveDate>,
    pub hrv: Option<f64>,
    pub resting_hr: Option<f64>,
    pub sleep_score: Option<f64>,
    pub step_count: Option<i64>,
    pub calories_burned: Option<f64>,
    pub source_system: Option<String>,
    pub ingested_at_health: Option<DateTime<Utc>>,
    pub recovery_status: Option<RecoveryStatus>,

    pub energy_level: Option<f64>,
    pub soreness: Option<f64>,
    pub mood_score: Option<u8>,
}

/// Rolling per-athlete summary stamped with the run that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AthleteMetric {
    pub athlete_id: String,
    pub rpe_avg: Option<f64>,
    pub training_load_7d: f64,
    pub hrv_trend: Option<f64>,
    pub generated_at: DateTime<Utc>,
}
