//! Per-source high-water marks and their on-disk store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::commit::write_atomic;
use crate::utils::{format_timestamp, parse_timestamp};
use crate::{EtlError, Result, Source};

/// The instant up to which each source has been processed. `None` means the
/// next run reads the whole dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredState")]
pub struct IncrementalState {
    #[serde(serialize_with = "serialize_watermark")]
    pub workouts: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_watermark")]
    pub wearables: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_watermark")]
    pub feedback: Option<DateTime<Utc>>,
}

/// On-disk layout, current and legacy key names side by side. A current key
/// holding a value takes precedence over its legacy name.
#[derive(Deserialize)]
struct StoredState {
    #[serde(default, deserialize_with = "deserialize_watermark")]
    workouts: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_watermark")]
    wearables: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_watermark")]
    feedback: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_watermark")]
    workouts_updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_watermark")]
    wearables_ingested_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_watermark")]
    feedback_updated_at: Option<DateTime<Utc>>,
}

impl From<StoredState> for IncrementalState {
    fn from(stored: StoredState) -> Self {
        Self {
            workouts: stored.workouts.or(stored.workouts_updated_at),
            wearables: stored.wearables.or(stored.wearables_ingested_at),
            feedback: stored.feedback.or(stored.feedback_updated_at),
        }
    }
}

impl IncrementalState {
    pub fn watermark(&self, source: Source) -> Option<DateTime<Utc>> {
        match source {
            Source::Workouts => self.workouts,
            Source::Wearables => self.wearables,
            Source::Feedback => self.feedback,
        }
    }

    fn slot(&mut self, source: Source) -> &mut Option<DateTime<Utc>> {
        match source {
            Source::Workouts => &mut self.workouts,
            Source::Wearables => &mut self.wearables,
            Source::Feedback => &mut self.feedback,
        }
    }

    /// Move a watermark forward to `observed`. `None` (nothing processed)
    /// and values behind the current mark leave it unchanged.
    pub fn advance(&mut self, source: Source, observed: Option<DateTime<Utc>>) {
        let slot = self.slot(source);
        *slot = match (*slot, observed) {
            (Some(current), Some(seen)) => Some(current.max(seen)),
            (current, None) => current,
            (None, seen) => seen,
        };
    }
}

fn serialize_watermark<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_some(&format_timestamp(ts)),
        None => serializer.serialize_none(),
    }
}

/// Accepts any timestamp form [`parse_timestamp`] does. Placeholders left by
/// dataframe tooling for an empty maximum ("nan", "NaT", "None") read as no
/// watermark.
fn deserialize_watermark<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("" | "nan" | "NaN" | "NaT" | "None" | "null") => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid watermark timestamp `{s}`"))),
    }
}

/// JSON file holding the committed [`IncrementalState`].
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the committed state; a missing file is the all-absent default.
    pub fn load(&self) -> Result<IncrementalState> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(IncrementalState::default()),
            Err(e) => Err(EtlError::io(&self.path, e)),
        }
    }

    /// Replace the committed state. A crash at any point leaves either the
    /// previous or the new file in place, never a partial one.
    pub fn save(&self, state: &IncrementalState) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(state)?;
        json.push(b'\n');
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("processed").join("state.json"));
        assert_eq!(store.load().expect("load"), IncrementalState::default());
    }

    #[test]
    fn save_then_load_returns_same_state() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("processed").join("state.json"));
        let state = IncrementalState {
            workouts: Some(ts("2023-01-02T10:00:00Z")),
            wearables: None,
            feedback: Some(ts("2023-01-01T12:00:00Z")),
        };
        store.save(&state).expect("save");
        assert_eq!(store.load().expect("load"), state);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["workouts"], "2023-01-02T10:00:00Z");
        assert!(raw["wearables"].is_null());
        // no staging leftovers beside the state file
        let entries: Vec<_> = fs::read_dir(dir.path().join("processed"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["state.json"]);
    }

    #[test]
    fn loads_legacy_keys_and_placeholders() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"workouts_updated_at": "2023-01-02 10:00:00+00:00",
                "wearables_ingested_at": "nan",
                "feedback_updated_at": null}"#,
        )
        .unwrap();
        let state = StateStore::new(&path).load().expect("load");
        assert_eq!(state.workouts, Some(ts("2023-01-02T10:00:00Z")));
        assert_eq!(state.wearables, None);
        assert_eq!(state.feedback, None);
    }

    #[test]
    fn current_keys_win_over_legacy_keys() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"workouts_updated_at": "2023-01-01T10:00:00Z",
                "workouts": "2023-01-05T10:00:00Z",
                "wearables_ingested_at": "2023-01-02T09:00:00Z",
                "wearables": null}"#,
        )
        .unwrap();
        let state = StateStore::new(&path).load().expect("load");
        assert_eq!(state.workouts, Some(ts("2023-01-05T10:00:00Z")));
        assert_eq!(state.wearables, Some(ts("2023-01-02T09:00:00Z")));
        assert_eq!(state.feedback, None);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"workouts": "last tuesday"}"#).unwrap();
        assert!(matches!(StateStore::new(&path).load(), Err(EtlError::State(_))));
    }

    #[test]
    fn advance_never_regresses() {
        let mut state = IncrementalState::default();
        state.advance(Source::Workouts, Some(ts("2023-01-02T10:00:00Z")));
        state.advance(Source::Workouts, Some(ts("2023-01-01T10:00:00Z")));
        state.advance(Source::Workouts, None);
        assert_eq!(state.workouts, Some(ts("2023-01-02T10:00:00Z")));

        state.advance(Source::Feedback, None);
        assert_eq!(state.watermark(Source::Feedback), None);
    }
}
