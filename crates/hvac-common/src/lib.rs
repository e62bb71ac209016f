//! HVAC monitor common types and errors.
//!
//! This crate provides foundational types shared across the monitor crates:
//! - The `Sample` record and its nested `Stage` ordinal
//! - Schema versioning for JSON outputs and config files
//! - The unified error type
//! - Output format selection for the CLI

pub mod error;
pub mod output;
pub mod sample;
pub mod schema;

pub use error::{Error, Result};
pub use output::OutputFormat;
pub use sample::{Sample, Stage, StageError, STAGE_LEVELS};
pub use schema::SCHEMA_VERSION;

/// SQLite busy timeout in milliseconds when none is configured.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
