//! Incremental athlete analytics: watermark-tracked extraction of workout,
//! wearable and feedback datasets, normalization, a merged fact table and
//! per-athlete rolling metrics.
//!
//! The entry point is [`job::TransformationJob`]. Everything it sequences is
//! exposed as a standalone module so each stage can be driven and tested on
//! its own.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod columnar;
pub mod commit;
pub mod config;
pub mod extract;
pub mod job;
pub mod merge;
pub mod normalize;
pub mod observability;
pub mod records;
pub mod recovery;
pub mod state;
pub mod utils;
pub mod validate;
pub mod window;

pub use config::JobConfig;
pub use job::{RunSummary, TransformationJob};
pub use records::{
    AthleteMetric, FactWorkoutSession, FeedbackRecord, NormalizedFeedback, NormalizedWearable,
    NormalizedWorkout, WearableRecord, WorkoutRecord,
};
pub use recovery::RecoveryStatus;
pub use state::{IncrementalState, StateStore};
pub use validate::ValidationError;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("missing raw dataset `{dataset}` at {path}")]
    MissingSource { dataset: &'static str, path: PathBuf },
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parquet error: {0}")]
    Parquet(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("state error: {0}")]
    State(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("another run holds the job lock at {0}")]
    Locked(PathBuf),
}

impl EtlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = EtlError> = std::result::Result<T, E>;

/// One of the three independently updated raw sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Workouts,
    Wearables,
    Feedback,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Workouts, Source::Wearables, Source::Feedback];

    /// Key used in the state file.
    pub fn name(self) -> &'static str {
        match self {
            Source::Workouts => "workouts",
            Source::Wearables => "wearables",
            Source::Feedback => "feedback",
        }
    }

    /// File stem of the raw dataset backing this source.
    pub fn dataset(self) -> &'static str {
        match self {
            Source::Workouts => "workouts",
            Source::Wearables => "wearables_daily",
            Source::Feedback => "feedback_forms",
        }
    }

    /// Column the watermark is tracked against.
    pub fn timestamp_column(self) -> &'static str {
        match self {
            Source::Workouts => "updated_at",
            Source::Wearables => "ingested_at",
            Source::Feedback => "submitted_at",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
