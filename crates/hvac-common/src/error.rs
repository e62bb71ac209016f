//! Error types for the HVAC monitor.

use thiserror::Error;

/// Result type alias for HVAC monitor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the HVAC monitor.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid config file: {0}")]
    InvalidConfig(String),

    // Storage errors (20-29)
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    // Ingestion errors (30-39)
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid reading: {0}")]
    InvalidReading(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::StorageUnavailable(_) => 20,
            Error::Storage(_) => 21,
            Error::MalformedPayload(_) => 30,
            Error::InvalidReading(_) => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
