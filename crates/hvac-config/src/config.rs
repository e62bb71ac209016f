//! Configuration file types.
//!
//! Every field has a default, so an empty object `{}` is a valid config.

use crate::validate::{ValidationError, ValidationResult};
use crate::{
    CONFIG_SCHEMA_VERSION, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_HOURS, DEFAULT_WINDOW_SECS, MAX_HOURS,
    MIN_HOURS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest busy timeout accepted: 10 minutes.
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;

/// Complete monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvacConfig {
    pub schema_version: String,

    /// Sample database; relative paths resolve against the data directory.
    pub db_path: PathBuf,

    /// Append-only diagnostic log; relative paths resolve against the data directory.
    pub log_path: PathBuf,

    /// Echo diagnostic log lines to stderr and raise the default log level.
    pub debug: bool,

    /// Trailing window for duty-cycle percentages, in seconds.
    pub window_secs: i64,

    /// Query span used when the caller gives none, in hours.
    pub default_hours: i64,

    /// How long a writer waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for HvacConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            db_path: PathBuf::from("hvac.db"),
            log_path: PathBuf::from("hvac.log"),
            debug: false,
            window_secs: DEFAULT_WINDOW_SECS,
            default_hours: DEFAULT_HOURS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl HvacConfig {
    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_json(&content)
    }

    /// Parse config from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !hvac_common::schema::is_compatible(&self.schema_version) {
            result.error(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, CONFIG_SCHEMA_VERSION
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            result.error("db_path must not be empty");
        }
        if self.log_path.as_os_str().is_empty() {
            result.error("log_path must not be empty");
        }
        if self.window_secs <= 0 {
            result.error(format!("window_secs must be positive, got {}", self.window_secs));
        }
        if !(MIN_HOURS..=MAX_HOURS).contains(&self.default_hours) {
            result.error(format!(
                "default_hours must be within {MIN_HOURS}..={MAX_HOURS}, got {}",
                self.default_hours
            ));
        }
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            result.error(format!(
                "busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}, got {}",
                self.busy_timeout_ms
            ));
        }
        if self.busy_timeout_ms == 0 {
            result.warn("busy_timeout_ms is 0; concurrent writers will fail instead of waiting");
        }
        if self.window_secs > self.default_hours * 3600 {
            result.warn(format!(
                "window_secs ({}) exceeds the default query span; every point will lack history",
                self.window_secs
            ));
        }

        result
    }
}
