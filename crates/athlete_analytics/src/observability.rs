//! Job metrics.
//!
//! Recorded through the `metrics` facade; they go nowhere until the host
//! process installs a recorder. Structured logs are emitted separately with
//! `tracing` at each stage of the job.

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::Source;

/// Rows read past the watermark, labelled by source.
pub const ROWS_EXTRACTED: &str = "athlete_analytics_rows_extracted_total";

/// Fact rows published.
pub const FACT_ROWS_WRITTEN: &str = "athlete_analytics_fact_rows_written_total";

/// Runs, labelled by outcome.
pub const RUNS: &str = "athlete_analytics_runs_total";

/// Wall time of a run, labelled by outcome.
pub const RUN_DURATION: &str = "athlete_analytics_run_duration_seconds";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Committed,
    NoOp,
    Failed,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Committed => "committed",
            RunOutcome::NoOp => "noop",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Registers metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!(ROWS_EXTRACTED, "Raw rows newer than the source watermark");
    describe_counter!(FACT_ROWS_WRITTEN, "Workout session fact rows published");
    describe_counter!(RUNS, "Transformation job runs by outcome");
    describe_histogram!(RUN_DURATION, "Duration of transformation job runs in seconds");
}

pub fn record_extracted(source: Source, rows: usize) {
    counter!(ROWS_EXTRACTED, "source" => source.name()).increment(rows as u64);
}

pub fn record_fact_rows(rows: usize) {
    counter!(FACT_ROWS_WRITTEN).increment(rows as u64);
}

pub fn record_run(outcome: RunOutcome, duration_secs: f64) {
    counter!(RUNS, "outcome" => outcome.as_str()).increment(1);
    histogram!(RUN_DURATION, "outcome" => outcome.as_str()).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(RunOutcome::Committed.as_str(), "committed");
        assert_eq!(RunOutcome::NoOp.as_str(), "noop");
        assert_eq!(RunOutcome::Failed.as_str(), "failed");
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        register_metrics();
        record_extracted(Source::Wearables, 3);
        record_fact_rows(2);
        record_run(RunOutcome::Committed, 0.25);
    }
}
