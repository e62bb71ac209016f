//! SQLite-backed sample store.
//!
//! Samples live in a single `hvac` table keyed by `time`. Each insert commits
//! on its own, so a batch may partially succeed; SQLite's locking serializes
//! concurrent writers and the primary key guarantees exactly one of them wins
//! a given timestamp. The connection is released when the store is dropped.

use crate::error::StorageError;
use hvac_common::{Sample, Stage, DEFAULT_BUSY_TIMEOUT_MS};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Schema for the sample table. Safe to run against an existing database.
pub const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS hvac (
        time INTEGER PRIMARY KEY,
        stage INTEGER,
        temperature REAL,
        humidity REAL
    )
";

const SELECT_COLUMNS: &str = "SELECT time, stage, temperature, humidity FROM hvac";

/// Outcome of a single insert. Neither variant is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    /// The sample was written.
    Inserted,
    /// A sample with the same time already exists; nothing changed.
    Duplicate,
}

/// Anything that can persist samples one at a time.
pub trait SampleWriter {
    fn insert(&self, sample: &Sample) -> Result<InsertOutcome, StorageError>;
}

/// Options applied when opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreOptions {
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

/// Handle to the sample database.
pub struct SampleStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore").field("path", &self.path).finish()
    }
}

impl SampleStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let unavailable = |source| StorageError::Unavailable {
            path: path.display().to_string(),
            source,
        };

        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(options.busy_timeout)
            .map_err(unavailable)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(unavailable)?;

        debug!(path = %path.display(), "sample store opened");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let unavailable = |source| StorageError::Unavailable {
            path: ":memory:".to_string(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(unavailable)?;
        Ok(Self { conn, path: None })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the sample table if it is missing.
    pub fn ensure_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(CREATE_TABLE_SQL)?;
        Ok(())
    }

    /// Persist one sample. An existing row with the same time is left as is.
    ///
    /// Non-finite readings are refused before touching the table.
    pub fn insert(&self, sample: &Sample) -> Result<InsertOutcome, StorageError> {
        check_finite(sample)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO hvac (time, stage, temperature, humidity) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let result = stmt.execute(params![
            sample.time,
            i64::from(sample.stage),
            sample.temperature,
            sample.humidity,
        ]);

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_key_conflict(&e) => {
                trace!(time = sample.time, "duplicate sample time");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    /// Samples with `start <= time <= end`, ascending by time.
    pub fn query_range(&self, start: i64, end: i64) -> Result<Vec<Sample>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE time >= ?1 AND time <= ?2 ORDER BY time ASC");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![start, end], sample_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Samples strictly newer than `after`, ascending by time.
    pub fn query_since(&self, after: i64) -> Result<Vec<Sample>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE time > ?1 ORDER BY time ASC");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![after], sample_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every stored sample, ascending by time.
    pub fn all(&self) -> Result<Vec<Sample>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY time ASC");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([], sample_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent sample with `time < before`.
    pub fn latest_before(&self, before: i64) -> Result<Option<Sample>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE time < ?1 ORDER BY time DESC LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![before], sample_from_row)
            .optional()?)
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM hvac", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Most recent sample, if the table is not empty.
    pub fn latest(&self) -> Result<Option<Sample>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY time DESC LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, [], sample_from_row)
            .optional()?)
    }

    /// Close the connection, surfacing any error the drop would swallow.
    pub fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

impl SampleWriter for SampleStore {
    fn insert(&self, sample: &Sample) -> Result<InsertOutcome, StorageError> {
        SampleStore::insert(self, sample)
    }
}

fn check_finite(sample: &Sample) -> Result<(), StorageError> {
    for (field, value) in [("temperature", sample.temperature), ("humidity", sample.humidity)] {
        if !value.is_finite() {
            return Err(StorageError::NonFinite {
                time: sample.time,
                field,
            });
        }
    }
    Ok(())
}

fn is_key_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let raw_stage: i64 = row.get(1)?;
    let stage = Stage::new(raw_stage).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Integer, Box::new(e))
    })?;
    Ok(Sample {
        time: row.get(0)?,
        stage,
        temperature: row.get(2)?,
        humidity: row.get(3)?,
    })
}
