//! Config resolution: CLI → env → XDG → defaults.
//!
//! The config file is chosen in this order:
//! 1. `--config` on the command line
//! 2. `HVAC_CONFIG`
//! 3. `$XDG_CONFIG_HOME/hvac_monitor/config.json` if it exists
//! 4. built-in defaults
//!
//! Relative `db_path` and `log_path` values are joined onto the data
//! directory (`--data-dir`, then `HVAC_DATA_DIR`, then the XDG data dir).
//! `HVAC_DB` and `HVAC_DEBUG` override single fields after the file loads.

use crate::config::HvacConfig;
use crate::validate::ValidationError;
use serde::Serialize;
use std::path::{Path, PathBuf};

const DIR_NAME: &str = "hvac_monitor";
const CONFIG_FILE_NAME: &str = "config.json";

const ENV_CONFIG: &str = "HVAC_CONFIG";
const ENV_DATA_DIR: &str = "HVAC_DATA_DIR";
const ENV_DB: &str = "HVAC_DB";
const ENV_DEBUG: &str = "HVAC_DEBUG";

/// Paths supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub config_file: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

/// Where the effective config came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    Cli(PathBuf),
    Env(PathBuf),
    Xdg(PathBuf),
    Defaults,
}

/// Config plus the absolute locations derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: HvacConfig,
    pub source: ConfigSource,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
}

/// Resolve using the process environment.
pub fn resolve_config(paths: &ConfigPaths) -> Result<ResolvedConfig, ValidationError> {
    resolve_config_with_env(paths, |key| std::env::var(key).ok())
}

/// Resolve with an injectable environment lookup.
pub fn resolve_config_with_env<F>(paths: &ConfigPaths, env: F) -> Result<ResolvedConfig, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, source) = load_config(paths, &env)?;

    if let Some(db) = env(ENV_DB).filter(|v| !v.is_empty()) {
        config.db_path = PathBuf::from(db);
    }
    if let Some(flag) = env(ENV_DEBUG) {
        config.debug = parse_flag(&flag);
    }

    config.validate().into_result()?;

    let data_dir = paths
        .data_dir
        .clone()
        .or_else(|| env(ENV_DATA_DIR).filter(|v| !v.is_empty()).map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|d| d.join(DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from("."));

    let db_path = anchor(&data_dir, &config.db_path);
    let log_path = anchor(&data_dir, &config.log_path);

    Ok(ResolvedConfig {
        config,
        source,
        data_dir,
        db_path,
        log_path,
    })
}

fn load_config<F>(paths: &ConfigPaths, env: &F) -> Result<(HvacConfig, ConfigSource), ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = &paths.config_file {
        return Ok((HvacConfig::from_file(path)?, ConfigSource::Cli(path.clone())));
    }

    if let Some(path) = env(ENV_CONFIG).filter(|v| !v.is_empty()).map(PathBuf::from) {
        return Ok((HvacConfig::from_file(&path)?, ConfigSource::Env(path)));
    }

    let xdg = env("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|d| d.join(DIR_NAME).join(CONFIG_FILE_NAME));
    if let Some(path) = xdg.filter(|p| p.is_file()) {
        return Ok((HvacConfig::from_file(&path)?, ConfigSource::Xdg(path)));
    }

    Ok((HvacConfig::default(), ConfigSource::Defaults))
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
