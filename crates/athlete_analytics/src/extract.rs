//! Reads a raw source and keeps the rows past its watermark.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::columnar::{Table, read_table};
use crate::config::dataset_path;
use crate::observability;
use crate::records::RawRecord;
use crate::{EtlError, Result};

#[derive(Clone, Debug)]
pub struct SourceExtractor {
    raw_dir: PathBuf,
}

impl SourceExtractor {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    pub fn path_for<R: RawRecord>(&self) -> PathBuf {
        dataset_path(&self.raw_dir, R::SOURCE.dataset())
    }

    /// Rows whose source timestamp is strictly after `watermark`, in file
    /// order. Without a watermark every row is returned.
    ///
    /// A missing dataset is fatal: an absent source must not be mistaken for
    /// a source with no new rows.
    pub fn extract<R>(&self, watermark: Option<DateTime<Utc>>) -> Result<Vec<R>>
    where
        R: RawRecord + Table,
    {
        let source = R::SOURCE;
        let path = self.path_for::<R>();
        if !path.is_file() {
            return Err(EtlError::MissingSource {
                dataset: source.dataset(),
                path,
            });
        }

        let rows: Vec<R> = read_table(&path)?;
        let total = rows.len();
        let fresh: Vec<R> = match watermark {
            Some(mark) => rows
                .into_iter()
                .filter(|r| r.watermark_value() > mark)
                .collect(),
            None => rows,
        };

        tracing::info!(
            source = source.name(),
            path = %path.display(),
            total,
            rows = fresh.len(),
            watermark = ?watermark,
            "extracted source"
        );
        observability::record_extracted(source, fresh.len());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::write_table;
    use crate::records::{FeedbackRecord, WearableRecord, WorkoutRecord};
    use crate::utils::{parse_date, parse_timestamp};
    use tempfile::tempdir;

    fn workout(id: &str, updated_at: &str) -> WorkoutRecord {
        WorkoutRecord {
            workout_id: Some(id.into()),
            athlete_id: "a1".into(),
            program_id: None,
            workout_date: parse_date("2023-01-01").unwrap(),
            duration_minutes: Some(30.0),
            rpe: Some(5.0),
            updated_at: parse_timestamp(updated_at).unwrap(),
        }
    }

    #[test]
    fn filters_strictly_after_watermark() {
        let dir = tempdir().expect("tempdir");
        let extractor = SourceExtractor::new(dir.path());
        write_table(
            &extractor.path_for::<WorkoutRecord>(),
            &[
                workout("w1", "2023-01-01T10:00:00Z"),
                workout("w2", "2023-01-02T10:00:00Z"),
                workout("w3", "2023-01-03T10:00:00Z"),
            ],
        )
        .expect("seed");

        let all: Vec<WorkoutRecord> = extractor.extract(None).expect("extract");
        assert_eq!(all.len(), 3);

        let mark = parse_timestamp("2023-01-02T10:00:00Z");
        let fresh: Vec<WorkoutRecord> = extractor.extract(mark).expect("extract");
        let ids: Vec<_> = fresh.iter().map(|w| w.workout_id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["w3"]);
    }

    #[test]
    fn comparison_uses_instants_not_text() {
        let dir = tempdir().expect("tempdir");
        let extractor = SourceExtractor::new(dir.path());
        write_table(
            &extractor.path_for::<WorkoutRecord>(),
            &[workout("w1", "2023-01-02T09:30:00Z")],
        )
        .expect("seed");
        // 10:00 at +02:00 is 08:00 UTC, earlier than the row
        let mark = parse_timestamp("2023-01-02T10:00:00+02:00");
        let fresh: Vec<WorkoutRecord> = extractor.extract(mark).expect("extract");
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn reads_where_config_places_raw_datasets() {
        let config = crate::JobConfig::under("/srv/analytics");
        let extractor = SourceExtractor::new(&config.raw_dir);
        for (path, source) in [
            (extractor.path_for::<WorkoutRecord>(), crate::Source::Workouts),
            (extractor.path_for::<WearableRecord>(), crate::Source::Wearables),
            (extractor.path_for::<FeedbackRecord>(), crate::Source::Feedback),
        ] {
            assert_eq!(path, config.raw_path(source.dataset()));
        }
    }

    #[test]
    fn missing_dataset_is_fatal() {
        let dir = tempdir().expect("tempdir");
        let extractor = SourceExtractor::new(dir.path());
        let err = extractor.extract::<FeedbackRecord>(None).unwrap_err();
        match err {
            EtlError::MissingSource { dataset, path } => {
                assert_eq!(dataset, "feedback_forms");
                assert_eq!(path, dir.path().join("feedback_forms.parquet"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
