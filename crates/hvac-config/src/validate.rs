//! Config validation errors and results.

use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl From<ValidationError> for hvac_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IoError(msg) => hvac_common::Error::Config(msg),
            other => hvac_common::Error::InvalidConfig(other.to_string()),
        }
    }
}

/// Outcome of semantic validation. Warnings never fail a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub(crate) fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Convert into an error if any check failed.
    pub fn into_result(self) -> Result<Vec<String>, ValidationError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationError::Invalid(self.errors))
        }
    }
}
