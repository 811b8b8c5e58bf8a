use std::collections::{HashMap, HashSet};

use super::{Normalizer, retain_indices};
use crate::records::{FeedbackRecord, NormalizedFeedback};

/// Score given to missing or unrecognized mood text ("ok").
pub const DEFAULT_MOOD_SCORE: u8 = 3;

const MOOD_SCORES: &[(&str, u8)] = &[("great", 5), ("good", 4), ("ok", 3), ("poor", 2), ("awful", 1)];

/// Map free-text mood to a 1-5 score, case-insensitively.
pub fn mood_score(mood: Option<&str>) -> u8 {
    let Some(mood) = mood else {
        return DEFAULT_MOOD_SCORE;
    };
    let mood = mood.trim().to_lowercase();
    MOOD_SCORES
        .iter()
        .find(|(label, _)| *label == mood)
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_MOOD_SCORE)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FeedbackNormalizer;

impl Normalizer for FeedbackNormalizer {
    type Input = FeedbackRecord;
    type Output = NormalizedFeedback;

    /// Score moods and keep the last occurrence of each feedback id in input
    /// order. Submission time plays no part in the dedup.
    fn normalize(&self, rows: Vec<FeedbackRecord>) -> Vec<NormalizedFeedback> {
        let mut last: HashMap<&str, usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            last.insert(row.feedback_id.as_str(), idx);
        }
        let keep: HashSet<usize> = last.into_values().collect();

        retain_indices(rows, &keep)
            .into_iter()
            .map(|record| NormalizedFeedback {
                mood_score: mood_score(record.mood.as_deref()),
                record,
            })
            .collect()
    }
}
