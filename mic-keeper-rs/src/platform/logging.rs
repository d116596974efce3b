//! File logging through `tracing`.
//!
//! Log lines are appended to a single file with no rotation. The level
//! follows `RUST_LOG`, defaulting to `info`.

use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber writing to `log_path`.
pub fn init_file_logging(log_path: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let appender = file_appender(log_path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(appender)
        .try_init();
    Ok(())
}

/// Install a subscriber writing to stderr.
pub fn init_stderr_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Append-only, never-rotating appender for exactly `log_path`.
fn file_appender(log_path: &Path) -> Result<RollingFileAppender> {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .with_context(|| format!("log path {} has no file name", log_path.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("open log file {}", log_path.display()))
}
