//! Recovery status classification from a rolling HRV z-score.
//!
//! Each athlete's samples are ordered by date. At every sample the trailing
//! window of up to [`WINDOW`] samples (the current one included) supplies a
//! mean and sample standard deviation; the current HRV is z-scored against
//! them and bucketed into a [`RecoveryStatus`]. Fewer than [`MIN_PERIODS`]
//! HRV observations in the window leaves the sample unlabelled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::window::{self, WindowStats};

pub const WINDOW: usize = 14;
pub const MIN_PERIODS: usize = 7;

/// Ordered from most to least fatigued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    Overreaching,
    Strain,
    Steady,
    Primed,
    Peak,
}

impl RecoveryStatus {
    pub const ALL: [RecoveryStatus; 5] = [
        RecoveryStatus::Overreaching,
        RecoveryStatus::Strain,
        RecoveryStatus::Steady,
        RecoveryStatus::Primed,
        RecoveryStatus::Peak,
    ];

    /// Bucket a z-score. Lower bounds are inclusive:
    /// `(-inf, -1.5)`, `[-1.5, -0.5)`, `[-0.5, 0.5)`, `[0.5, 1.5)`, `[1.5, inf)`.
    pub fn from_z_score(z: f64) -> Option<Self> {
        if !z.is_finite() {
            return None;
        }
        let status = if z < -1.5 {
            RecoveryStatus::Overreaching
        } else if z < -0.5 {
            RecoveryStatus::Strain
        } else if z < 0.5 {
            RecoveryStatus::Steady
        } else if z < 1.5 {
            RecoveryStatus::Primed
        } else {
            RecoveryStatus::Peak
        };
        Some(status)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStatus::Overreaching => "overreaching",
            RecoveryStatus::Strain => "strain",
            RecoveryStatus::Steady => "steady",
            RecoveryStatus::Primed => "primed",
            RecoveryStatus::Peak => "peak",
        }
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecoveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown recovery status `{s}`"))
    }
}

/// Z-scores of one athlete's date-ordered HRV series.
pub fn rolling_z_scores(hrv: &[Option<f64>]) -> Vec<Option<f64>> {
    let stats = window::rolling(hrv, WINDOW, MIN_PERIODS, WindowStats::of);
    hrv.iter()
        .zip(stats)
        .map(|(value, stats)| {
            let value = (*value)?;
            let stats = stats?;
            let std_dev = stats.std_dev.filter(|sd| *sd > 0.0)?;
            Some((value - stats.mean) / std_dev)
        })
        .collect()
}

/// Labels for one athlete's date-ordered HRV series, position for position.
pub fn classify_series(hrv: &[Option<f64>]) -> Vec<Option<RecoveryStatus>> {
    rolling_z_scores(hrv)
        .into_iter()
        .map(|z| z.and_then(RecoveryStatus::from_z_score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_lower_inclusive() {
        use RecoveryStatus::*;
        let cases = [
            (-3.0, Overreaching),
            (-1.5000001, Overreaching),
            (-1.5, Strain),
            (-0.5000001, Strain),
            (-0.5, Steady),
            (0.0, Steady),
            (0.4999999, Steady),
            (0.5, Primed),
            (1.4999999, Primed),
            (1.5, Peak),
            (8.0, Peak),
        ];
        for (z, expected) in cases {
            assert_eq!(RecoveryStatus::from_z_score(z), Some(expected), "z = {z}");
        }
    }

    #[test]
    fn non_finite_z_is_unlabelled() {
        assert_eq!(RecoveryStatus::from_z_score(f64::NAN), None);
        assert_eq!(RecoveryStatus::from_z_score(f64::NEG_INFINITY), None);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in RecoveryStatus::ALL {
            assert_eq!(status.as_str().parse::<RecoveryStatus>(), Ok(status));
        }
        assert!("tired".parse::<RecoveryStatus>().is_err());
        assert!(RecoveryStatus::Overreaching < RecoveryStatus::Peak);
    }

    #[test]
    fn first_six_samples_are_unlabelled() {
        let hrv: Vec<Option<f64>> = [60.0, 62.0, 58.0, 61.0, 59.0, 63.0, 57.0, 60.0]
            .into_iter()
            .map(Some)
            .collect();
        let labels = classify_series(&hrv);
        assert!(labels[..6].iter().all(Option::is_none));
        assert!(labels[6].is_some());
        assert!(labels[7].is_some());
    }

    #[test]
    fn sharp_drop_after_stable_week_is_overreaching() {
        // Seven samples with mean 60 and sample std 2, then one sample 2 std
        // below that mean. The 8-sample window containing it scores it at
        // -1.75 / sqrt(9.5 / 7), independent of the base values.
        let base = [58.0, 62.0, 58.0, 62.0, 58.0, 62.0, 60.0];
        let mean = base.iter().sum::<f64>() / 7.0;
        let sd = (base.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 6.0).sqrt();
        let mut hrv: Vec<Option<f64>> = base.into_iter().map(Some).collect();
        hrv.push(Some(mean - 2.0 * sd));
        for v in [60.0, 61.0, 59.0, 60.0, 62.0, 58.0] {
            hrv.push(Some(v));
        }
        assert_eq!(hrv.len(), 14);

        let z = rolling_z_scores(&hrv);
        let expected = -1.75 / (9.5f64 / 7.0).sqrt();
        assert!((z[7].unwrap() - expected).abs() < 1e-9, "z = {:?}", z[7]);
        assert!(expected < -1.5);

        let labels = classify_series(&hrv);
        assert!(labels[..6].iter().all(Option::is_none));
        assert_eq!(labels[7], Some(RecoveryStatus::Overreaching));
    }

    #[test]
    fn window_is_capped_at_fourteen_samples() {
        // An early outlier stops influencing the score once it leaves the window.
        let mut hrv = vec![Some(200.0)];
        hrv.extend((0..14).map(|i| Some(if i % 2 == 0 { 50.0 } else { 52.0 })));
        let z = rolling_z_scores(&hrv);
        let last = z[14].unwrap();
        // window of the last 14 holds alternating 50/52 only, last value is 52
        assert!(last > 0.9 && last < 1.0, "z = {last}");
    }

    #[test]
    fn null_hrv_is_skipped_but_occupies_a_slot() {
        let mut hrv: Vec<Option<f64>> = vec![Some(60.0), None, Some(61.0), Some(59.0)];
        hrv.extend([Some(60.0), Some(62.0), Some(58.0), Some(60.0)]);
        let labels = classify_series(&hrv);
        // seven observations are only available at index 7
        assert!(labels[..7].iter().all(Option::is_none));
        assert!(labels[7].is_some());
        assert_eq!(classify_series(&[None; 10]), vec![None; 10]);
    }

    #[test]
    fn flat_series_has_no_deviation_and_no_label() {
        let hrv = vec![Some(55.0); 10];
        assert!(classify_series(&hrv).iter().all(Option::is_none));
    }
}
