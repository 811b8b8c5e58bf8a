//! Parquet encoding/decoding for the raw sources and the processed outputs.
//!
//! Each row type implements [`Table`]. Schemas are defined once, by the
//! column builders in `to_batch`; an empty slice produces an empty batch with
//! the full schema, which is what gets written when a run has no rows for a
//! table.
//!
//! Readers are lenient about physical types so files produced by other
//! writers (pandas/pyarrow in particular) load without conversion: any
//! numeric column is cast to the type the row expects, NaN is read as null,
//! and timestamp or date columns may be stored as text or as native Arrow
//! temporal types.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Field, Float64Type, Int64Type, Schema, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::records::{
    AthleteMetric, FactWorkoutSession, FeedbackRecord, NormalizedFeedback, NormalizedWearable,
    WearableRecord, WorkoutRecord,
};
use crate::utils::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::{EtlError, Result};

/// A row type with a fixed columnar layout.
pub trait Table: Sized {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

/// Schema of a table, as written.
pub fn schema_of<T: Table>() -> Result<Arc<Schema>> {
    Ok(T::to_batch(&[])?.schema())
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(concat!("athlete_analytics ", env!("CARGO_PKG_VERSION")).to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Write `rows` to `path` and fsync the file. Parent directories are created.
///
/// This writes in place; callers that need the previous file to survive a
/// failure stage through [`crate::commit::OutputSet`].
pub fn write_table<T: Table>(path: &Path, rows: &[T]) -> Result<()> {
    let batch = T::to_batch(rows)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| EtlError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))
        .map_err(|e| EtlError::Parquet(format!("parquet writer init failed: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| EtlError::Parquet(format!("parquet write failed: {e}")))?;
    let file = writer
        .into_inner()
        .map_err(|e| EtlError::Parquet(format!("parquet close failed: {e}")))?;
    file.sync_all().map_err(|e| EtlError::io(path, e))?;
    Ok(())
}

/// Read every row of a Parquet file.
pub fn read_table<T: Table>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EtlError::Parquet(format!("parquet reader init failed: {e}")))?
        .build()
        .map_err(|e| EtlError::Parquet(format!("parquet reader build failed: {e}")))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| EtlError::Parquet(format!("parquet read batch failed: {e}")))?;
        rows.extend(T::from_batch(&batch)?);
    }
    Ok(rows)
}

// ============================================================================
// Batch construction
// ============================================================================

#[derive(Default)]
struct Columns {
    fields: Vec<Field>,
    arrays: Vec<ArrayRef>,
}

impl Columns {
    fn push(mut self, name: &str, nullable: bool, array: ArrayRef) -> Self {
        self.fields
            .push(Field::new(name, array.data_type().clone(), nullable));
        self.arrays.push(array);
        self
    }

    fn text<'a, I>(self, name: &str, nullable: bool, values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let array: StringArray = values.into_iter().collect();
        self.push(name, nullable, Arc::new(array))
    }

    fn owned_text<I>(self, name: &str, nullable: bool, values: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let array: StringArray = values.into_iter().collect();
        self.push(name, nullable, Arc::new(array))
    }

    fn dates<I>(self, name: &str, nullable: bool, values: I) -> Self
    where
        I: IntoIterator<Item = Option<NaiveDate>>,
    {
        self.owned_text(name, nullable, values.into_iter().map(|d| d.as_ref().map(format_date)))
    }

    fn timestamps<I>(self, name: &str, nullable: bool, values: I) -> Self
    where
        I: IntoIterator<Item = Option<DateTime<Utc>>>,
    {
        self.owned_text(
            name,
            nullable,
            values.into_iter().map(|t| t.as_ref().map(format_timestamp)),
        )
    }

    fn float<I>(self, name: &str, nullable: bool, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let array: Float64Array = values.into_iter().collect();
        self.push(name, nullable, Arc::new(array))
    }

    fn int<I>(self, name: &str, nullable: bool, values: I) -> Self
    where
        I: IntoIterator<Item = Option<i64>>,
    {
        let array: Int64Array = values.into_iter().collect();
        self.push(name, nullable, Arc::new(array))
    }

    fn finish(self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(self.fields));
        RecordBatch::try_new(schema, self.arrays)
            .map_err(|e| EtlError::Parquet(format!("record batch build failed: {e}")))
    }
}

// ============================================================================
// Column access
// ============================================================================

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| EtlError::Schema(format!("missing column '{name}'")))
}

fn cast_column(array: &ArrayRef, name: &str, to: &DataType) -> Result<ArrayRef> {
    cast(array, to).map_err(|e| {
        EtlError::Schema(format!(
            "column '{name}' of type {} is not readable as {to}: {e}",
            array.data_type()
        ))
    })
}

fn text_values(array: &ArrayRef, name: &str) -> Result<Vec<Option<String>>> {
    let array = cast_column(array, name, &DataType::Utf8)?;
    Ok(array
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn text(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    text_values(column(batch, name)?, name)
}

/// Like [`text`], but a column absent from the file reads as all-null.
fn optional_text(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    match batch.column_by_name(name) {
        Some(array) => text_values(array, name),
        None => Ok(vec![None; batch.num_rows()]),
    }
}

fn float_values(array: &ArrayRef, name: &str) -> Result<Vec<Option<f64>>> {
    let array = cast_column(array, name, &DataType::Float64)?;
    Ok(array
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.filter(|f| !f.is_nan()))
        .collect())
}

fn float(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    float_values(column(batch, name)?, name)
}

fn optional_float(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    match batch.column_by_name(name) {
        Some(array) => float_values(array, name),
        None => Ok(vec![None; batch.num_rows()]),
    }
}

fn optional_int(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    let Some(array) = batch.column_by_name(name) else {
        return Ok(vec![None; batch.num_rows()]);
    };
    // go through f64 so NaN-as-missing in float columns reads as null
    if array.data_type().is_floating() {
        return Ok(float_values(array, name)?
            .into_iter()
            .map(|v| v.map(|f| f.round() as i64))
            .collect());
    }
    let array = cast_column(array, name, &DataType::Int64)?;
    Ok(array.as_primitive::<Int64Type>().iter().collect())
}

fn parse_each<T>(
    values: Vec<Option<String>>,
    name: &str,
    kind: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            None => Ok(None),
            Some(s) => parse(&s).map(Some).ok_or_else(|| {
                EtlError::Schema(format!("column '{name}' row {row}: invalid {kind} '{s}'"))
            }),
        })
        .collect()
}

/// Instants of a native Arrow temporal column, `None` for any other type.
///
/// Timestamps are epoch offsets whatever their time zone annotation, so the
/// zone name never has to be resolved. Zone-less values are read as UTC.
fn temporal_instants(array: &ArrayRef) -> Option<Vec<Option<DateTime<Utc>>>> {
    let instants = match array.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => array
            .as_primitive::<TimestampSecondType>()
            .iter()
            .map(|v| v.and_then(|s| DateTime::from_timestamp(s, 0)))
            .collect(),
        DataType::Timestamp(TimeUnit::Millisecond, _) => array
            .as_primitive::<TimestampMillisecondType>()
            .iter()
            .map(|v| v.and_then(DateTime::from_timestamp_millis))
            .collect(),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_primitive::<TimestampMicrosecondType>()
            .iter()
            .map(|v| v.and_then(DateTime::from_timestamp_micros))
            .collect(),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => array
            .as_primitive::<TimestampNanosecondType>()
            .iter()
            .map(|v| v.map(DateTime::from_timestamp_nanos))
            .collect(),
        DataType::Date32 => array
            .as_primitive::<Date32Type>()
            .iter()
            .map(|v| v.and_then(|days| DateTime::from_timestamp(i64::from(days) * 86_400, 0)))
            .collect(),
        DataType::Date64 => array
            .as_primitive::<Date64Type>()
            .iter()
            .map(|v| v.and_then(DateTime::from_timestamp_millis))
            .collect(),
        _ => return None,
    };
    Some(instants)
}

fn dates(batch: &RecordBatch, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let array = column(batch, name)?;
    match temporal_instants(array) {
        Some(instants) => Ok(instants
            .into_iter()
            .map(|t| t.map(|t| t.date_naive()))
            .collect()),
        None => parse_each(text_values(array, name)?, name, "date", parse_date),
    }
}

fn timestamps(batch: &RecordBatch, name: &str) -> Result<Vec<Option<DateTime<Utc>>>> {
    let array = column(batch, name)?;
    match temporal_instants(array) {
        Some(instants) => Ok(instants),
        None => parse_each(text_values(array, name)?, name, "timestamp", parse_timestamp),
    }
}

fn required<T>(value: Option<T>, name: &str, row: usize) -> Result<T> {
    value.ok_or_else(|| EtlError::Schema(format!("column '{name}' row {row}: unexpected null")))
}

fn take<T: Default>(values: &mut [T], row: usize) -> T {
    std::mem::take(&mut values[row])
}

// ============================================================================
// Raw sources
// ============================================================================

impl Table for WorkoutRecord {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Columns::default()
            .text("workout_id", true, rows.iter().map(|r| r.workout_id.as_deref()))
            .text("athlete_id", false, rows.iter().map(|r| Some(r.athlete_id.as_str())))
            .text("program_id", true, rows.iter().map(|r| r.program_id.as_deref()))
            .dates("workout_date", false, rows.iter().map(|r| Some(r.workout_date)))
            .float("duration_minutes", true, rows.iter().map(|r| r.duration_minutes))
            .float("rpe", true, rows.iter().map(|r| r.rpe))
            .timestamps("updated_at", false, rows.iter().map(|r| Some(r.updated_at)))
            .finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let mut workout_id = text(batch, "workout_id")?;
        let mut athlete_id = text(batch, "athlete_id")?;
        let mut program_id = optional_text(batch, "program_id")?;
        let workout_date = dates(batch, "workout_date")?;
        let duration_minutes = float(batch, "duration_minutes")?;
        let rpe = float(batch, "rpe")?;
        let updated_at = timestamps(batch, "updated_at")?;

        (0..batch.num_rows())
            .map(|row| {
                Ok(WorkoutRecord {
                    workout_id: take(&mut workout_id, row),
                    athlete_id: required(take(&mut athlete_id, row), "athlete_id", row)?,
                    program_id: take(&mut program_id, row),
                    workout_date: required(workout_date[row], "workout_date", row)?,
                    duration_minutes: duration_minutes[row],
                    rpe: rpe[row],
                    updated_at: required(updated_at[row], "updated_at", row)?,
                })
            })
            .collect()
    }
}

fn wearable_columns<'a>(rows: impl Iterator<Item = &'a WearableRecord> + Clone) -> Columns {
    Columns::default()
        .text("athlete_id", false, rows.clone().map(|r| Some(r.athlete_id.as_str())))
        .dates("sample_date", false, rows.clone().map(|r| Some(r.sample_date)))
        .float("hrv", true, rows.clone().map(|r| r.hrv))
        .float("resting_hr", true, rows.clone().map(|r| r.resting_hr))
        .float("sleep_score", true, rows.clone().map(|r| r.sleep_score))
        .int("step_count", true, rows.clone().map(|r| r.step_count))
        .float("calories_burned", true, rows.clone().map(|r| r.calories_burned))
        .text("source_system", true, rows.clone().map(|r| r.source_system.as_deref()))
        .timestamps("ingested_at", false, rows.map(|r| Some(r.ingested_at)))
}

fn wearables_from_batch(batch: &RecordBatch) -> Result<Vec<WearableRecord>> {
    let mut athlete_id = text(batch, "athlete_id")?;
    let sample_date = dates(batch, "sample_date")?;
    let hrv = float(batch, "hrv")?;
    let resting_hr = optional_float(batch, "resting_hr")?;
    let sleep_score = optional_float(batch, "sleep_score")?;
    let step_count = optional_int(batch, "step_count")?;
    let calories_burned = optional_float(batch, "calories_burned")?;
    let mut source_system = optional_text(batch, "source_system")?;
    let ingested_at = timestamps(batch, "ingested_at")?;

    (0..batch.num_rows())
        .map(|row| {
            Ok(WearableRecord {
                athlete_id: required(take(&mut athlete_id, row), "athlete_id", row)?,
                sample_date: required(sample_date[row], "sample_date", row)?,
                hrv: hrv[row],
                resting_hr: resting_hr[row],
                sleep_score: sleep_score[row],
                step_count: step_count[row],
                calories_burned: calories_burned[row],
                source_system: take(&mut source_system, row),
                ingested_at: required(ingested_at[row], "ingested_at", row)?,
            })
        })
        .collect()
}

impl Table for WearableRecord {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        wearable_columns(rows.iter()).finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        wearables_from_batch(batch)
    }
}

fn feedback_columns<'a>(rows: impl Iterator<Item = &'a FeedbackRecord> + Clone) -> Columns {
    Columns::default()
        .text("feedback_id", false, rows.clone().map(|r| Some(r.feedback_id.as_str())))
        .text("workout_id", true, rows.clone().map(|r| r.workout_id.as_deref()))
        .text("athlete_id", false, rows.clone().map(|r| Some(r.athlete_id.as_str())))
        .text("mood", true, rows.clone().map(|r| r.mood.as_deref()))
        .float("energy_level", true, rows.clone().map(|r| r.energy_level))
        .float("soreness", true, rows.clone().map(|r| r.soreness))
        .timestamps("submitted_at", false, rows.map(|r| Some(r.submitted_at)))
}

fn feedback_from_batch(batch: &RecordBatch) -> Result<Vec<FeedbackRecord>> {
    let mut feedback_id = text(batch, "feedback_id")?;
    let mut workout_id = text(batch, "workout_id")?;
    let mut athlete_id = text(batch, "athlete_id")?;
    let mut mood = optional_text(batch, "mood")?;
    let energy_level = optional_float(batch, "energy_level")?;
    let soreness = optional_float(batch, "soreness")?;
    let submitted_at = timestamps(batch, "submitted_at")?;

    (0..batch.num_rows())
        .map(|row| {
            Ok(FeedbackRecord {
                feedback_id: required(take(&mut feedback_id, row), "feedback_id", row)?,
                workout_id: take(&mut workout_id, row),
                athlete_id: required(take(&mut athlete_id, row), "athlete_id", row)?,
                mood: take(&mut mood, row),
                energy_level: energy_level[row],
                soreness: soreness[row],
                submitted_at: required(submitted_at[row], "submitted_at", row)?,
            })
        })
        .collect()
}

impl Table for FeedbackRecord {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        feedback_columns(rows.iter()).finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        feedback_from_batch(batch)
    }
}

// ============================================================================
// Processed outputs
// ============================================================================

fn recovery_statuses(batch: &RecordBatch) -> Result<Vec<Option<crate::RecoveryStatus>>> {
    parse_each(
        optional_text(batch, "recovery_status")?,
        "recovery_status",
        "recovery status",
        |s| s.parse().ok(),
    )
}

impl Table for NormalizedWearable {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        wearable_columns(rows.iter().map(|r| &r.record))
            .text(
                "recovery_status",
                true,
                rows.iter().map(|r| r.recovery_status.map(|s| s.as_str())),
            )
            .finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let statuses = recovery_statuses(batch)?;
        Ok(wearables_from_batch(batch)?
            .into_iter()
            .zip(statuses)
            .map(|(record, recovery_status)| NormalizedWearable {
                record,
                recovery_status,
            })
            .collect())
    }
}

fn mood_scores(values: Vec<Option<i64>>) -> Result<Vec<Option<u8>>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|score| {
                u8::try_from(score).map_err(|_| {
                    EtlError::Schema(format!("column 'mood_score' row {row}: invalid score {score}"))
                })
            })
            .transpose()
        })
        .collect()
}

impl Table for NormalizedFeedback {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        feedback_columns(rows.iter().map(|r| &r.record))
            .int("mood_score", false, rows.iter().map(|r| Some(i64::from(r.mood_score))))
            .finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let scores = mood_scores(optional_int(batch, "mood_score")?)?;
        feedback_from_batch(batch)?
            .into_iter()
            .zip(scores)
            .enumerate()
            .map(|(row, (record, score))| {
                Ok(NormalizedFeedback {
                    record,
                    mood_score: required(score, "mood_score", row)?,
                })
            })
            .collect()
    }
}

impl Table for FactWorkoutSession {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let r = rows.iter();
        Columns::default()
            .text("workout_id", true, r.clone().map(|f| f.workout_id.as_deref()))
            .text("athlete_id", false, r.clone().map(|f| Some(f.athlete_id.as_str())))
            .text("program_id", true, r.clone().map(|f| f.program_id.as_deref()))
            .dates("workout_date", false, r.clone().map(|f| Some(f.workout_date)))
            .float("duration_minutes", true, r.clone().map(|f| f.duration_minutes))
            .float("rpe", true, r.clone().map(|f| f.rpe))
            .timestamps("updated_at", false, r.clone().map(|f| Some(f.updated_at)))
            .float("training_load", false, r.clone().map(|f| Some(f.training_load)))
            .dates("sample_date_health", true, r.clone().map(|f| f.sample_date_health))
            .float("hrv", true, r.clone().map(|f| f.hrv))
            .float("resting_hr", true, r.clone().map(|f| f.resting_hr))
            .float("sleep_score", true, r.clone().map(|f| f.sleep_score))
            .int("step_count", true, r.clone().map(|f| f.step_count))
            .float("calories_burned", true, r.clone().map(|f| f.calories_burned))
            .text("source_system", true, r.clone().map(|f| f.source_system.as_deref()))
            .timestamps("ingested_at_health", true, r.clone().map(|f| f.ingested_at_health))
            .text(
                "recovery_status",
                true,
                r.clone().map(|f| f.recovery_status.map(|s| s.as_str())),
            )
            .float("energy_level", true, r.clone().map(|f| f.energy_level))
            .float("soreness", true, r.clone().map(|f| f.soreness))
            .int("mood_score", true, r.map(|f| f.mood_score.map(i64::from)))
            .finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let mut workout_id = text(batch, "workout_id")?;
        let mut athlete_id = text(batch, "athlete_id")?;
        let mut program_id = optional_text(batch, "program_id")?;
        let workout_date = dates(batch, "workout_date")?;
        let duration_minutes = float(batch, "duration_minutes")?;
        let rpe = float(batch, "rpe")?;
        let updated_at = timestamps(batch, "updated_at")?;
        let training_load = float(batch, "training_load")?;
        let sample_date_health = dates(batch, "sample_date_health")?;
        let hrv = float(batch, "hrv")?;
        let resting_hr = optional_float(batch, "resting_hr")?;
        let sleep_score = optional_float(batch, "sleep_score")?;
        let step_count = optional_int(batch, "step_count")?;
        let calories_burned = optional_float(batch, "calories_burned")?;
        let mut source_system = optional_text(batch, "source_system")?;
        let ingested_at_health = timestamps(batch, "ingested_at_health")?;
        let recovery_status = recovery_statuses(batch)?;
        let energy_level = optional_float(batch, "energy_level")?;
        let soreness = optional_float(batch, "soreness")?;
        let mood_score = mood_scores(optional_int(batch, "mood_score")?)?;

        (0..batch.num_rows())
            .map(|row| {
                Ok(FactWorkoutSession {
                    workout_id: take(&mut workout_id, row),
                    athlete_id: required(take(&mut athlete_id, row), "athlete_id", row)?,
                    program_id: take(&mut program_id, row),
                    workout_date: required(workout_date[row], "workout_date", row)?,
                    duration_minutes: duration_minutes[row],
                    rpe: rpe[row],
                    updated_at: required(updated_at[row], "updated_at", row)?,
                    training_load: required(training_load[row], "training_load", row)?,
                    sample_date_health: sample_date_health[row],
                    hrv: hrv[row],
                    resting_hr: resting_hr[row],
                    sleep_score: sleep_score[row],
                    step_count: step_count[row],
                    calories_burned: calories_burned[row],
                    source_system: take(&mut source_system, row),
                    ingested_at_health: ingested_at_health[row],
                    recovery_status: recovery_status[row],
                    energy_level: energy_level[row],
                    soreness: soreness[row],
                    mood_score: mood_score[row],
                })
            })
            .collect()
    }
}

impl Table for AthleteMetric {
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Columns::default()
            .text("athlete_id", false, rows.iter().map(|m| Some(m.athlete_id.as_str())))
            .float("rpe_avg", true, rows.iter().map(|m| m.rpe_avg))
            .float("training_load_7d", false, rows.iter().map(|m| Some(m.training_load_7d)))
            .float("hrv_trend", true, rows.iter().map(|m| m.hrv_trend))
            .timestamps("generated_at", false, rows.iter().map(|m| Some(m.generated_at)))
            .finish()
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let mut athlete_id = text(batch, "athlete_id")?;
        let rpe_avg = float(batch, "rpe_avg")?;
        let training_load_7d = float(batch, "training_load_7d")?;
        let hrv_trend = float(batch, "hrv_trend")?;
        let generated_at = timestamps(batch, "generated_at")?;

        (0..batch.num_rows())
            .map(|row| {
                Ok(AthleteMetric {
                    athlete_id: required(take(&mut athlete_id, row), "athlete_id", row)?,
                    rpe_avg: rpe_avg[row],
                    training_load_7d: required(training_load_7d[row], "training_load_7d", row)?,
                    hrv_trend: hrv_trend[row],
                    generated_at: required(generated_at[row], "generated_at", row)?,
                })
            })
            .collect()
    }
}
