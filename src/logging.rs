//! Logging setup.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// `stress_test_YYYYmmdd_HHMMSS.log` for the given local time.
pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("stress_test_{}.log", now.format("%Y%m%d_%H%M%S"))
}

fn stderr_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy()
}

/// Controller logging: everything from INFO up goes to a fresh per-run log
/// file in `dir`; warnings and errors (or `RUST_LOG`) also reach stderr so
/// they do not scroll the dashboard away.
pub fn init_run_log(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(log_file_name(chrono::Local::now()));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter()),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    info!("Log file created: {}", path.display());
    Ok(path)
}

/// Worker logging: stderr only.
pub fn init_worker_log() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(stderr_filter())
        .with_writer(std::io::stderr)
        .try_init();
}
