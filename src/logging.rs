//! File logging.
//!
//! The terminal is in the alternate screen while the visualizer runs, so log
//! lines go to a file instead of stderr. `RUST_LOG` overrides the level.

use crate::error::Result;
use crate::settings::LoggingSettings;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

/// Log files may contain device names; owner read/write only.
const LOG_FILE_MODE: u32 = 0o600;

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("guessviz.log")
}

/// Install the global subscriber. Returns the log path when logging is on.
pub fn init(settings: &LoggingSettings, force: bool) -> Result<Option<PathBuf>> {
    if !(settings.enabled || force) {
        return Ok(None);
    }

    let path = settings.path.clone().unwrap_or_else(default_log_path);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(LOG_FILE_MODE)
        .open(&path)?;

    let level = settings
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::DEBUG);
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let installed = fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(path = %path.display(), %level, "logging initialized");
    }
    Ok(Some(path))
}
