//! Append-only diagnostic log.
//!
//! Rejected records, duplicates, storage failures, and batch summaries are
//! written here for post-hoc debugging. The log is a side channel: a failed
//! write is reported through `tracing` and never changes a result.
//!
//! Line format: `YYYY/MM/DD HH:MM:SS - <message>` (local time).

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Handle to the diagnostic log file.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: Option<PathBuf>,
    echo: bool,
}

impl DiagnosticLog {
    /// Log to `path`; when `echo` is set every line is also printed to stderr.
    pub fn new(path: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            path: Some(path.into()),
            echo,
        }
    }

    /// A log that only forwards to `tracing`.
    pub fn disabled() -> Self {
        Self {
            path: None,
            echo: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Append one line.
    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!(target: "hvac::diag", "{message}");

        let line = format!("{} - {}", Local::now().format(TIMESTAMP_FORMAT), message);
        if self.echo {
            eprintln!("{line}");
        }

        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, &line) {
                warn!(path = %path.display(), error = %e, "failed to write diagnostic log");
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
