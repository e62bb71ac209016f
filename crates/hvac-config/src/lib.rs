//! HVAC monitor configuration loading and validation.
//!
//! This crate provides:
//! - The typed [`HvacConfig`] file format
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod config;
pub mod resolve;
pub mod validate;

pub use config::HvacConfig;
pub use resolve::{resolve_config, resolve_config_with_env, ConfigPaths, ConfigSource, ResolvedConfig};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Trailing window used for duty-cycle percentages: 2 hours.
pub const DEFAULT_WINDOW_SECS: i64 = 2 * 3600;

/// Query span when none is given.
pub const DEFAULT_HOURS: i64 = 24;

/// Smallest query span in hours.
pub const MIN_HOURS: i64 = 1;

/// Largest query span in hours (one year).
pub const MAX_HOURS: i64 = 8760;

pub use hvac_common::DEFAULT_BUSY_TIMEOUT_MS;
