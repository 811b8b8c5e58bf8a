//! The incremental transformation run.
//!
//! One run: lock, load watermarks, extract the three sources, normalize,
//! merge, validate, aggregate, publish the outputs and finally advance the
//! watermarks. The state file is written last, so a run that fails anywhere
//! before it leaves the previous watermarks in place and the next run picks
//! up the same rows again.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::aggregate;
use crate::commit::{JobLock, OutputSet};
use crate::config::JobConfig;
use crate::extract::SourceExtractor;
use crate::merge::merge;
use crate::normalize::{FeedbackNormalizer, Normalizer, WearableNormalizer, WorkoutNormalizer};
use crate::observability::{self, RunOutcome};
use crate::records::{FeedbackRecord, RawRecord, WearableRecord, WorkoutRecord};
use crate::state::{IncrementalState, StateStore};
use crate::validate::validate;
use crate::{Result, Source};

/// Row counts for each source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub workouts: usize,
    pub wearables: usize,
    pub feedback: usize,
}

impl SourceCounts {
    pub fn get(&self, source: Source) -> usize {
        match source {
            Source::Workouts => self.workouts,
            Source::Wearables => self.wearables,
            Source::Feedback => self.feedback,
        }
    }

    pub fn total(&self) -> usize {
        self.workouts + self.wearables + self.feedback
    }
}

/// What a run did. Handed to whatever triggered the run for reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_time: DateTime<Utc>,
    pub extracted: SourceCounts,
    pub normalized: SourceCounts,
    pub fact_rows: usize,
    pub metric_rows: usize,
    pub state_before: IncrementalState,
    pub state_after: IncrementalState,
    /// False for a run that found nothing new and wrote nothing.
    pub committed: bool,
}

#[derive(Clone, Debug)]
pub struct TransformationJob {
    config: JobConfig,
    run_time: Option<DateTime<Utc>>,
}

impl TransformationJob {
    pub fn new(config: JobConfig) -> Self {
        Self {
            config,
            run_time: None,
        }
    }

    /// Fix the instant stamped on metric rows instead of reading the clock.
    pub fn with_run_time(config: JobConfig, run_time: DateTime<Utc>) -> Self {
        Self {
            config,
            run_time: Some(run_time),
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let span = tracing::info_span!(
            "transformation_job",
            processed_dir = %self.config.processed_dir.display()
        );
        let _guard = span.enter();

        let result = self.execute();
        let outcome = match &result {
            Ok(summary) if summary.committed => RunOutcome::Committed,
            Ok(_) => RunOutcome::NoOp,
            Err(e) => {
                tracing::error!(error = %e, "transformation job failed");
                RunOutcome::Failed
            }
        };
        let elapsed = started.elapsed().as_secs_f64();
        observability::record_run(outcome, elapsed);
        tracing::info!(outcome = outcome.as_str(), elapsed_secs = elapsed, "run finished");
        result
    }

    fn execute(&self) -> Result<RunSummary> {
        let _lock = JobLock::acquire(self.config.lock_path())?;
        let run_time = self.run_time.unwrap_or_else(Utc::now);

        let store = StateStore::new(&self.config.state_file);
        let state_before = store.load()?;

        let extractor = SourceExtractor::new(&self.config.raw_dir);
        let workouts: Vec<WorkoutRecord> =
            extractor.extract(state_before.watermark(Source::Workouts))?;
        let wearables: Vec<WearableRecord> =
            extractor.extract(state_before.watermark(Source::Wearables))?;
        let feedback: Vec<FeedbackRecord> =
            extractor.extract(state_before.watermark(Source::Feedback))?;
        let extracted = SourceCounts {
            workouts: workouts.len(),
            wearables: wearables.len(),
            feedback: feedback.len(),
        };

        if extracted.total() == 0 {
            tracing::info!("no rows past the watermarks, nothing to commit");
            return Ok(RunSummary {
                run_time,
                extracted,
                normalized: SourceCounts::default(),
                fact_rows: 0,
                metric_rows: 0,
                state_after: state_before.clone(),
                state_before,
                committed: false,
            });
        }

        let workouts = WorkoutNormalizer.normalize(workouts);
        let wearables = WearableNormalizer.normalize(wearables);
        let feedback = FeedbackNormalizer.normalize(feedback);
        let normalized = SourceCounts {
            workouts: workouts.len(),
            wearables: wearables.len(),
            feedback: feedback.len(),
        };
        tracing::debug!(?normalized, "normalized sources");

        let facts = merge(&workouts, &wearables, &feedback);
        validate(&facts)?;
        let metrics = aggregate(&facts, run_time);

        let mut outputs = OutputSet::new();
        outputs.stage(self.config.fact_workout_sessions_path(), &facts)?;
        outputs.stage(self.config.athlete_health_path(), &wearables)?;
        outputs.stage(self.config.fact_feedback_path(), &feedback)?;
        outputs.stage(self.config.athlete_metrics_path(), &metrics)?;
        let published = outputs.finalize()?;

        let mut state_after = state_before.clone();
        state_after.advance(
            Source::Workouts,
            latest(workouts.iter().map(|w| &w.record)),
        );
        state_after.advance(
            Source::Wearables,
            latest(wearables.iter().map(|w| &w.record)),
        );
        state_after.advance(
            Source::Feedback,
            latest(feedback.iter().map(|f| &f.record)),
        );

        if let Err(e) = store.save(&state_after) {
            if let Err(rollback) = published.rollback() {
                tracing::error!(error = %rollback, "outputs could not be rolled back after state save failure");
            }
            return Err(e);
        }
        // the run is committed once state is saved; stale backups are harmless
        if let Err(e) = published.complete() {
            tracing::warn!(error = %e, "failed to remove previous outputs");
        }

        observability::record_fact_rows(facts.len());
        tracing::info!(
            fact_rows = facts.len(),
            metric_rows = metrics.len(),
            "committed run"
        );

        Ok(RunSummary {
            run_time,
            extracted,
            normalized,
            fact_rows: facts.len(),
            metric_rows: metrics.len(),
            state_before,
            state_after,
            committed: true,
        })
    }
}

/// Greatest watermark value among `rows`, `None` when there are none.
fn latest<'a, R>(rows: impl Iterator<Item = &'a R>) -> Option<DateTime<Utc>>
where
    R: RawRecord + 'a,
{
    rows.map(RawRecord::watermark_value).max()
}
