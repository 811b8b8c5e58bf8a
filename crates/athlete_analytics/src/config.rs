use std::path::{Path, PathBuf};

use crate::EtlError;

pub const FACT_WORKOUT_SESSIONS_FILE: &str = "fact_workout_sessions.parquet";
pub const ATHLETE_HEALTH_FILE: &str = "dim_athlete_health.parquet";
pub const FACT_FEEDBACK_FILE: &str = "fact_feedback.parquet";
pub const ATHLETE_METRICS_FILE: &str = "athlete_metrics.parquet";
pub const STATE_FILE: &str = "state.json";
pub const LOCK_FILE: &str = ".athlete_analytics.lock";

/// File of a raw dataset under `raw_dir`.
pub fn dataset_path(raw_dir: &Path, dataset: &str) -> PathBuf {
    raw_dir.join(format!("{dataset}.parquet"))
}

/// Locations the transformation job reads from and writes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub state_file: PathBuf,
}

impl JobConfig {
    /// Conventional layout below a single data root:
    /// `raw/`, `processed/`, `metrics/` and `processed/state.json`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let processed_dir = root.join("processed");
        Self {
            raw_dir: root.join("raw"),
            state_file: processed_dir.join(STATE_FILE),
            processed_dir,
            metrics_dir: root.join("metrics"),
        }
    }

    pub fn from_env() -> Result<Self, EtlError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, EtlError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut path_var = |key: &str| -> Result<Option<PathBuf>, EtlError> {
            match get(key) {
                Some(v) if v.trim().is_empty() => {
                    Err(EtlError::Config(format!("{key} is set but empty")))
                }
                Some(v) => Ok(Some(PathBuf::from(v))),
                None => Ok(None),
            }
        };

        let root = path_var("ATHLETE_ANALYTICS_DATA_DIR")?.unwrap_or_else(|| "data".into());
        let defaults = Self::under(&root);
        let raw_dir = path_var("ATHLETE_ANALYTICS_RAW_DIR")?.unwrap_or(defaults.raw_dir);
        let processed_dir =
            path_var("ATHLETE_ANALYTICS_PROCESSED_DIR")?.unwrap_or(defaults.processed_dir);
        let metrics_dir = path_var("ATHLETE_ANALYTICS_METRICS_DIR")?.unwrap_or(defaults.metrics_dir);
        let state_file = path_var("ATHLETE_ANALYTICS_STATE_FILE")?
            .unwrap_or_else(|| processed_dir.join(STATE_FILE));

        Ok(Self {
            raw_dir,
            processed_dir,
            metrics_dir,
            state_file,
        })
    }

    pub fn raw_path(&self, dataset: &str) -> PathBuf {
        dataset_path(&self.raw_dir, dataset)
    }

    pub fn fact_workout_sessions_path(&self) -> PathBuf {
        self.processed_dir.join(FACT_WORKOUT_SESSIONS_FILE)
    }

    pub fn athlete_health_path(&self) -> PathBuf {
        self.processed_dir.join(ATHLETE_HEALTH_FILE)
    }

    pub fn fact_feedback_path(&self) -> PathBuf {
        self.processed_dir.join(FACT_FEEDBACK_FILE)
    }

    pub fn athlete_metrics_path(&self) -> PathBuf {
        self.metrics_dir.join(ATHLETE_METRICS_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.processed_dir.join(LOCK_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_uses_defaults() {
        let cfg = JobConfig::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.raw_dir, PathBuf::from("data/raw"));
        assert_eq!(cfg.processed_dir, PathBuf::from("data/processed"));
        assert_eq!(cfg.metrics_dir, PathBuf::from("data/metrics"));
        assert_eq!(cfg.state_file, PathBuf::from("data/processed/state.json"));
    }

    #[test]
    fn from_env_reads_values() {
        let get = |k: &str| match k {
            "ATHLETE_ANALYTICS_DATA_DIR" => Some("/srv/analytics".into()),
            "ATHLETE_ANALYTICS_PROCESSED_DIR" => Some("/srv/marts".into()),
            _ => None,
        };
        let cfg = JobConfig::from_env_with(get).expect("cfg");
        assert_eq!(cfg.raw_dir, PathBuf::from("/srv/analytics/raw"));
        assert_eq!(cfg.processed_dir, PathBuf::from("/srv/marts"));
        // state follows the processed dir unless set explicitly
        assert_eq!(cfg.state_file, PathBuf::from("/srv/marts/state.json"));
    }

    #[test]
    fn from_env_rejects_empty_value() {
        let get = |k: &str| match k {
            "ATHLETE_ANALYTICS_STATE_FILE" => Some("  ".into()),
            _ => None,
        };
        let res = JobConfig::from_env_with(get);
        assert!(matches!(res, Err(EtlError::Config(_))));
    }

    #[test]
    fn output_paths_live_under_configured_dirs() {
        let cfg = JobConfig::under("/tmp/x");
        assert_eq!(
            cfg.raw_path("wearables_daily"),
            PathBuf::from("/tmp/x/raw/wearables_daily.parquet")
        );
        assert_eq!(
            cfg.athlete_metrics_path(),
            PathBuf::from("/tmp/x/metrics/athlete_metrics.parquet")
        );
        assert_eq!(
            cfg.lock_path(),
            PathBuf::from("/tmp/x/processed/.athlete_analytics.lock")
        );
    }
}
