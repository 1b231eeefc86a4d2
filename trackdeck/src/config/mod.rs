//! Configuration file handling.
//!
//! Settings are read from `~/.trackdeck/config.ini`. Each runtime component
//! has its own typed config (`FeedConfig`, `MapConfig`, ...) with a
//! `From<&ConfigFile>` conversion, so the file format stays in this module.

mod file;
mod keys;

pub use file::{
    ConfigFile, DiagnosticsSettings, FeedSettings, LoggingSettings, MapSettings,
    DEFAULT_BOOTSTRAP_DEADLINE_SECS, DEFAULT_FALLBACK_STYLE_URL, DEFAULT_FALLBACK_TILE_URL,
    DEFAULT_FEED_BASE_URL, DEFAULT_MAX_POINTS, DEFAULT_PROBE_TIMEOUT_SECS,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STYLE_URL,
};
pub use keys::{ConfigKey, ConfigKeyError};

use std::path::PathBuf;

use thiserror::Error;

/// Name of the per-user configuration directory under `$HOME`.
const CONFIG_DIR_NAME: &str = ".trackdeck";

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The configuration directory, `~/.trackdeck`.
///
/// Falls back to the current directory when no home directory is known.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
