//! Ingestion pipeline: validate external record batches and store them.
//!
//! A payload is a JSON array of `[time, stage, temperature, humidity]`
//! tuples. Each element is checked on its own: a bad record is skipped and
//! reported, a duplicate time counts as success, and a storage failure on one
//! record does not stop the rest. Only a payload that is not a JSON array (or
//! a store that cannot be opened) fails the whole batch.
//!
//! The array is split into raw elements before any element is decoded, so a
//! number outside the `f64` range (`1e400`) only costs its own record.
//!
//! Types are checked strictly: `time` and `stage` must be JSON integers and
//! `temperature` and `humidity` must be JSON reals, so `70` is rejected where
//! `70.0` is expected.

use crate::diag::DiagnosticLog;
use hvac_common::{Sample, Stage};
use hvac_store::{InsertOutcome, SampleWriter, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Number of fields in one record.
pub const RECORD_ARITY: usize = 4;

/// Batch-level ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    InvalidReading(#[from] InvalidRecord),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<IngestError> for hvac_common::Error {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MalformedPayload(msg) => hvac_common::Error::MalformedPayload(msg),
            IngestError::InvalidReading(reason) => {
                hvac_common::Error::InvalidReading(reason.to_string())
            }
            IngestError::Storage(e) => e.into(),
            IngestError::Io { source, .. } => hvac_common::Error::Io(source),
        }
    }
}

/// Why a single record was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidRecord {
    #[error("record could not be decoded: {detail}")]
    Undecodable { detail: String },

    #[error("record is not an array")]
    NotAnArray,

    #[error("bad num elements: expected 4, found {found}")]
    WrongArity { found: usize },

    #[error("0 not int: time must be an integer")]
    TimeNotInteger,

    #[error("1 not int: stage must be an integer")]
    StageNotInteger,

    #[error("stage {stage} outside 0..=3")]
    StageOutOfRange { stage: i64 },

    #[error("2 not float: temperature must be a real number")]
    TemperatureNotReal,

    #[error("3 not float: humidity must be a real number")]
    HumidityNotReal,

    #[error("temperature {value} is not finite")]
    TemperatureNotFinite { value: String },

    #[error("humidity {value} is not finite")]
    HumidityNotFinite { value: String },
}

/// A record that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Position in the payload array.
    pub index: usize,
    pub reason: InvalidRecord,
}

/// A valid record the store refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub index: usize,
    pub time: i64,
    pub message: String,
}

/// Per-batch accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: String,
    /// Records seen in the payload.
    pub total: usize,
    /// Records written by this batch.
    pub persisted: usize,
    /// Records whose time was already stored.
    pub duplicates: usize,
    pub skipped: Vec<SkippedRecord>,
    pub failed: Vec<FailedRecord>,
}

impl IngestReport {
    fn new(total: usize) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            total,
            persisted: 0,
            duplicates: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Every record was either written or already present.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "batch {}: total={} persisted={} duplicates={} skipped={} failed={}",
            self.batch_id,
            self.total,
            self.persisted,
            self.duplicates,
            self.skipped.len(),
            self.failed.len()
        )
    }
}

/// Check one payload element and convert it to a sample.
pub fn validate_record(value: &Value) -> Result<Sample, InvalidRecord> {
    let fields = value.as_array().ok_or(InvalidRecord::NotAnArray)?;
    if fields.len() != RECORD_ARITY {
        return Err(InvalidRecord::WrongArity {
            found: fields.len(),
        });
    }

    let time = strict_integer(&fields[0]).ok_or(InvalidRecord::TimeNotInteger)?;
    let raw_stage = strict_integer(&fields[1]).ok_or(InvalidRecord::StageNotInteger)?;
    let temperature = strict_real(&fields[2]).ok_or(InvalidRecord::TemperatureNotReal)?;
    let humidity = strict_real(&fields[3]).ok_or(InvalidRecord::HumidityNotReal)?;
    let stage =
        Stage::new(raw_stage).map_err(|_| InvalidRecord::StageOutOfRange { stage: raw_stage })?;
    check_readings(temperature, humidity)?;

    Ok(Sample::new(time, stage, temperature, humidity))
}

/// Both readings must be finite; SQLite turns NaN into NULL.
pub fn check_readings(temperature: f64, humidity: f64) -> Result<(), InvalidRecord> {
    if !temperature.is_finite() {
        return Err(InvalidRecord::TemperatureNotFinite {
            value: temperature.to_string(),
        });
    }
    if !humidity.is_finite() {
        return Err(InvalidRecord::HumidityNotFinite {
            value: humidity.to_string(),
        });
    }
    Ok(())
}

fn strict_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => n.as_i64(),
        _ => None,
    }
}

fn strict_real(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if n.is_f64() => n.as_f64(),
        _ => None,
    }
}

/// Parse `payload` and write every valid record through `writer`.
pub fn ingest_batch<W>(
    writer: &W,
    payload: &[u8],
    diag: &DiagnosticLog,
) -> Result<IngestReport, IngestError>
where
    W: SampleWriter + ?Sized,
{
    let raw: &RawValue = serde_json::from_slice(payload).map_err(|e| {
        diag.record(format!("json is not valid: {e}"));
        IngestError::MalformedPayload(e.to_string())
    })?;

    let records: Vec<&RawValue> = match serde_json::from_str(raw.get()) {
        Ok(records) => records,
        Err(_) => {
            let kind = raw_kind(raw);
            diag.record(format!("json is not an array (found {kind})"));
            return Err(IngestError::MalformedPayload(format!(
                "expected an array of records, found {kind}"
            )));
        }
    };

    let mut report = IngestReport::new(records.len());
    debug!(batch_id = %report.batch_id, total = report.total, "ingesting batch");

    for (index, raw) in records.iter().enumerate() {
        let decoded = serde_json::from_str::<Value>(raw.get())
            .map_err(|e| InvalidRecord::Undecodable {
                detail: e.to_string(),
            })
            .and_then(|value| validate_record(&value));
        let sample = match decoded {
            Ok(sample) => sample,
            Err(reason) => {
                diag.record(format!("record {index} skipped: {reason} - {raw}"));
                report.skipped.push(SkippedRecord { index, reason });
                continue;
            }
        };

        match writer.insert(&sample) {
            Ok(InsertOutcome::Inserted) => report.persisted += 1,
            Ok(InsertOutcome::Duplicate) => {
                diag.record(format!(
                    "record {index} duplicate time {} ignored - {raw}",
                    sample.time
                ));
                report.duplicates += 1;
            }
            Err(e) => {
                diag.record(format!("record {index} not stored: {e} - {raw}"));
                warn!(index, time = sample.time, error = %e, "failed to store record");
                report.failed.push(FailedRecord {
                    index,
                    time: sample.time,
                    message: e.to_string(),
                });
            }
        }
    }

    diag.record(report.summary());
    info!(
        batch_id = %report.batch_id,
        total = report.total,
        persisted = report.persisted,
        duplicates = report.duplicates,
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "batch ingested"
    );
    Ok(report)
}

/// Read a payload from `path`, or from stdin when there is none.
pub fn read_payload(path: Option<&Path>, diag: &DiagnosticLog) -> Result<Vec<u8>, IngestError> {
    let result = match path {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf).map(|_| buf)
        }
    };
    result.map_err(|source| {
        let path = path.map_or_else(|| PathBuf::from("<stdin>"), Path::to_path_buf);
        diag.record(format!("cannot read {}: {source}", path.display()));
        IngestError::Io { path, source }
    })
}

/// Store a single reading stamped with the current time.
pub fn record_now<W>(
    writer: &W,
    stage: Stage,
    temperature: f64,
    humidity: f64,
    diag: &DiagnosticLog,
) -> Result<(Sample, InsertOutcome), IngestError>
where
    W: SampleWriter + ?Sized,
{
    check_readings(temperature, humidity).map_err(|reason| {
        diag.record(format!("reading rejected: {reason}"));
        reason
    })?;
    let sample = Sample::new(chrono::Utc::now().timestamp(), stage, temperature, humidity);
    let outcome = writer.insert(&sample).map_err(|e| {
        diag.record(format!("reading at {} not stored: {e}", sample.time));
        e
    })?;
    if outcome == InsertOutcome::Duplicate {
        diag.record(format!("reading at {} duplicates a stored time", sample.time));
    }
    Ok((sample, outcome))
}

/// JSON type of an already validated raw value, from its first byte.
fn raw_kind(raw: &RawValue) -> &'static str {
    match raw.get().trim_start().as_bytes().first() {
        Some(b'n') => "null",
        Some(b't' | b'f') => "boolean",
        Some(b'"') => "string",
        Some(b'[') => "array",
        Some(b'{') => "object",
        _ => "number",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvac_store::{SampleStore, StoreOptions};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// In-memory writer that fails on chosen times.
    #[derive(Default)]
    struct FakeWriter {
        rows: RefCell<BTreeMap<i64, Sample>>,
        fail_on: Vec<i64>,
    }

    impl SampleWriter for FakeWriter {
        fn insert(&self, sample: &Sample) -> Result<InsertOutcome, StorageError> {
            if self.fail_on.contains(&sample.time) {
                return Err(StorageError::Sqlite(rusqlite_disk_error()));
            }
            let mut rows = self.rows.borrow_mut();
            if rows.contains_key(&sample.time) {
                return Ok(InsertOutcome::Duplicate);
            }
            rows.insert(sample.time, *sample);
            Ok(InsertOutcome::Inserted)
        }
    }

    fn rusqlite_disk_error() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
            Some("disk I/O error".to_string()),
        )
    }

    #[test]
    fn test_validate_accepts_well_typed_record() {
        let sample = validate_record(&json!([1_700_000_000, 2, 71.5, 40.0])).unwrap();
        assert_eq!(sample.time, 1_700_000_000);
        assert_eq!(sample.stage.value(), 2);
        assert_eq!(sample.temperature, 71.5);
        assert_eq!(sample.humidity, 40.0);
    }

    #[test]
    fn test_validate_is_strict_about_types() {
        let cases = [
            (json!({"time": 1}), InvalidRecord::NotAnArray),
            (json!([1, 2, 3.0]), InvalidRecord::WrongArity { found: 3 }),
            (json!([1, 2, 3.0, 4.0, 5.0]), InvalidRecord::WrongArity { found: 5 }),
            (json!([1.0, 2, 70.0, 40.0]), InvalidRecord::TimeNotInteger),
            (json!(["1", 2, 70.0, 40.0]), InvalidRecord::TimeNotInteger),
            (json!([1, 2.0, 70.0, 40.0]), InvalidRecord::StageNotInteger),
            (json!([1, 2, 70, 40.0]), InvalidRecord::TemperatureNotReal),
            (json!([1, 2, 70.0, 40]), InvalidRecord::HumidityNotReal),
            (json!([1, 2, null, 40.0]), InvalidRecord::TemperatureNotReal),
            (json!([1, 4, 70.0, 40.0]), InvalidRecord::StageOutOfRange { stage: 4 }),
            (json!([1, -1, 70.0, 40.0]), InvalidRecord::StageOutOfRange { stage: -1 }),
        ];
        for (value, expected) in cases {
            assert_eq!(validate_record(&value), Err(expected), "{value}");
        }
    }

    #[test]
    fn test_partial_batch_persists_only_valid_records() {
        let writer = FakeWriter::default();
        let payload = br#"[[100, 1, 70.5, 40.0], [200, 1, 70, 40.0]]"#;
        let report = ingest_batch(&writer, payload, &DiagnosticLog::disabled()).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].reason, InvalidRecord::TemperatureNotReal);
        assert!(!report.is_clean());
        assert_eq!(writer.rows.borrow().keys().copied().collect::<Vec<_>>(), vec![100]);
    }

    #[test]
    fn test_duplicates_are_success() {
        let writer = FakeWriter::default();
        let payload = br#"[[100, 0, 70.0, 40.0], [100, 3, 99.0, 99.0]]"#;
        let report = ingest_batch(&writer, payload, &DiagnosticLog::disabled()).unwrap();
        assert_eq!(report.persisted, 1);
        assert_eq!(report.duplicates, 1);
        assert!(report.is_clean());
        assert_eq!(writer.rows.borrow()[&100].stage, Stage::IDLE);
    }

    #[test]
    fn test_storage_failure_does_not_stop_batch() {
        let writer = FakeWriter {
            fail_on: vec![200],
            ..FakeWriter::default()
        };
        let payload = br#"[[100, 0, 70.0, 40.0], [200, 1, 70.0, 40.0], [300, 2, 70.0, 40.0]]"#;
        let report = ingest_batch(&writer, payload, &DiagnosticLog::disabled()).unwrap();
        assert_eq!(report.persisted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].time, 200);
        assert!(report.failed[0].message.contains("disk I/O"));
    }

    #[test]
    fn test_malformed_payloads() {
        let writer = FakeWriter::default();
        for payload in [&b"{not json"[..], b"42", br#"{"time": 1}"#, b""] {
            let err = ingest_batch(&writer, payload, &DiagnosticLog::disabled()).unwrap_err();
            assert!(matches!(err, IngestError::MalformedPayload(_)), "{err:?}");
        }
        assert!(writer.rows.borrow().is_empty());
    }

    #[test]
    fn test_empty_array_is_clean_noop() {
        let writer = FakeWriter::default();
        let report = ingest_batch(&writer, b"[]", &DiagnosticLog::disabled()).unwrap();
        assert_eq!(report.total, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_rejections_reach_diagnostic_log() {
        let tmp = TempDir::new().unwrap();
        let log_path = tmp.path().join("hvac.log");
        let diag = DiagnosticLog::new(&log_path, false);
        let writer = FakeWriter::default();
        let payload = br#"[[1, 0, 70.0, 40.0], [1, 0, 70.0, 40.0], [2, 0, 70.0]]"#;
        ingest_batch(&writer, payload, &diag).unwrap();

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("record 1 duplicate time 1"));
        assert!(log.contains("record 2 skipped: bad num elements"));
        assert!(log.contains("total=3 persisted=1 duplicates=1 skipped=1 failed=0"));
    }

    #[test]
    fn test_out_of_range_number_only_skips_its_record() {
        let writer = FakeWriter::default();
        let payload = br#"[[100, 1, 1e400, 40.0], [200, 1, 70.0, 40.0]]"#;
        let report = ingest_batch(&writer, payload, &DiagnosticLog::disabled()).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 0);
        assert!(matches!(report.skipped[0].reason, InvalidRecord::Undecodable { .. }));
        assert_eq!(writer.rows.borrow().keys().copied().collect::<Vec<_>>(), vec![200]);
    }

    #[test]
    fn test_non_finite_readings_are_rejected() {
        assert!(check_readings(70.0, 40.0).is_ok());
        assert!(matches!(
            check_readings(f64::NAN, 40.0),
            Err(InvalidRecord::TemperatureNotFinite { .. })
        ));
        assert!(matches!(
            check_readings(70.0, f64::NEG_INFINITY),
            Err(InvalidRecord::HumidityNotFinite { .. })
        ));
    }

    #[test]
    fn test_batch_round_trip_through_store() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path().join("hvac.db"), &StoreOptions::default()).unwrap();
        let payload = br#"[[300, 2, 72.25, 41.5], [100, 0, 70.0, 40.0], [200, 1, 71.0, 40.5]]"#;
        let report = ingest_batch(&store, payload, &DiagnosticLog::disabled()).unwrap();
        assert_eq!(report.persisted, 3);

        let rows = store.query_range(100, 300).unwrap();
        let times: Vec<i64> = rows.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![100, 200, 300]);
        assert_eq!(rows[2].temperature, 72.25);
    }

    #[test]
    fn test_read_payload_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("batch.json");
        std::fs::write(&path, "[]").unwrap();
        let bytes = read_payload(Some(path.as_path()), &DiagnosticLog::disabled()).unwrap();
        assert_eq!(bytes, b"[]");
    }

    #[test]
    fn test_read_payload_missing_file() {
        let tmp = TempDir::new().unwrap();
        let log_path = tmp.path().join("hvac.log");
        let diag = DiagnosticLog::new(&log_path, false);
        let err = read_payload(Some(Path::new("/nonexistent/batch.json")), &diag).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("cannot read /nonexistent/batch.json"));
    }

    #[test]
    fn test_record_now() {
        let writer = FakeWriter::default();
        let (sample, outcome) = record_now(
            &writer,
            Stage::new(1).unwrap(),
            68.0,
            35.0,
            &DiagnosticLog::disabled(),
        )
        .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(sample.time > 1_600_000_000);
    }

    #[test]
    fn test_record_now_refuses_nan_before_writing() {
        let writer = FakeWriter::default();
        let err = record_now(
            &writer,
            Stage::new(1).unwrap(),
            f64::NAN,
            40.0,
            &DiagnosticLog::disabled(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidReading(InvalidRecord::TemperatureNotFinite { .. })
        ));
        assert!(writer.rows.borrow().is_empty());

        let common: hvac_common::Error = err.into();
        assert!(matches!(common, hvac_common::Error::InvalidReading(_)));
    }
}
