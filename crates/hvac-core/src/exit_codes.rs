//! Exit codes for the `hvac` CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//! Clap reports usage errors itself with exit code 2.

/// Exit codes for hvac operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed; every record accepted
    Clean = 0,

    /// Batch ingested but some records were skipped or not stored
    PartialIngest = 3,

    /// Configuration error
    ConfigError = 10,

    /// Sample store could not be opened
    StorageUnavailable = 11,

    /// Ingestion payload is not an array of records, or a reading was rejected
    MalformedPayload = 12,

    /// I/O error
    IoError = 13,

    /// Read or write against an open store failed
    StorageError = 14,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map a unified error onto its exit code.
    pub fn for_error(err: &hvac_common::Error) -> Self {
        use hvac_common::Error;
        match err {
            Error::Config(_) | Error::InvalidConfig(_) => ExitCode::ConfigError,
            Error::StorageUnavailable(_) => ExitCode::StorageUnavailable,
            Error::Storage(_) => ExitCode::StorageError,
            Error::MalformedPayload(_) | Error::InvalidReading(_) => ExitCode::MalformedPayload,
            Error::Io(_) => ExitCode::IoError,
            Error::Json(_) => ExitCode::InternalError,
        }
    }
}
