//! Error types for sample storage.

use thiserror::Error;

/// Errors from the sample store.
///
/// A duplicate primary key is not an error; see
/// [`InsertOutcome::Duplicate`](crate::InsertOutcome::Duplicate).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened or its schema could not be created.
    #[error("sample store unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A reading that SQLite cannot store faithfully (NaN reads back as NULL).
    #[error("sample at {time} has non-finite {field}")]
    NonFinite { time: i64, field: &'static str },

    /// A read or write against an open store failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

impl From<StorageError> for hvac_common::Error {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::Unavailable { .. } => {
                hvac_common::Error::StorageUnavailable(err.to_string())
            }
            StorageError::NonFinite { .. } => hvac_common::Error::InvalidReading(err.to_string()),
            StorageError::Sqlite(e) => hvac_common::Error::Storage(e.to_string()),
        }
    }
}
