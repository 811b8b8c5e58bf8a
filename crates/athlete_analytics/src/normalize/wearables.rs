use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use super::{Normalizer, retain_indices};
use crate::records::{NormalizedWearable, WearableRecord};
use crate::recovery;
use crate::window;

#[derive(Clone, Copy, Debug, Default)]
pub struct WearableNormalizer;

impl Normalizer for WearableNormalizer {
    type Input = WearableRecord;
    type Output = NormalizedWearable;

    /// Order by ingestion time, keep the latest ingestion per athlete-day and
    /// label every surviving sample with its recovery status.
    fn normalize(&self, mut rows: Vec<WearableRecord>) -> Vec<NormalizedWearable> {
        rows.sort_by_key(|r| r.ingested_at);

        let mut latest: HashMap<(&str, NaiveDate), usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            latest.insert((row.athlete_id.as_str(), row.sample_date), idx);
        }
        let keep: HashSet<usize> = latest.into_values().collect();
        let rows = retain_indices(rows, &keep);

        let mut statuses = vec![None; rows.len()];
        let by_athlete =
            window::group_sorted_indices(&rows, |r| r.athlete_id.as_str(), |r| r.sample_date);
        for indices in by_athlete.into_values() {
            let hrv: Vec<Option<f64>> = indices.iter().map(|&i| rows[i].hrv).collect();
            for (i, status) in indices.into_iter().zip(recovery::classify_series(&hrv)) {
                statuses[i] = status;
            }
        }

        rows.into_iter()
            .zip(statuses)
            .map(|(record, recovery_status)| NormalizedWearable {
                record,
                recovery_status,
            })
            .collect()
    }
}
