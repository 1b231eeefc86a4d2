//! Logging setup.
//!
//! Log output goes to a daily rolling file in the configured directory,
//! written through a non-blocking worker. An optional stderr layer is used by
//! headless commands; the terminal dashboard leaves it off so the screen
//! stays clean.
//!
//! `RUST_LOG` overrides the configured level when set.

use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigFile;

/// Errors from installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files.
    pub directory: PathBuf,
    /// File name prefix; files are suffixed with the date.
    pub file_prefix: String,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Also write human-readable output to stderr.
    pub stderr: bool,
}

impl LoggingConfig {
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl From<&ConfigFile> for LoggingConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            directory: config.logging.directory.clone(),
            file_prefix: "trackdeck.log".to_string(),
            level: config.logging.level.clone(),
            stderr: false,
        }
    }
}

/// Keeps the background log writer alive. Drop it at shutdown to flush.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    pub log_directory: PathBuf,
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(&directives).map_err(|_| LoggingError::Filter(directives))
        }
        _ => EnvFilter::try_new(level).map_err(|_| LoggingError::Filter(level.to_string())),
    }
}

fn local_timer() -> OffsetTime<Rfc3339> {
    OffsetTime::local_rfc_3339().unwrap_or_else(|_| OffsetTime::new(UtcOffset::UTC, Rfc3339))
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    std::fs::create_dir_all(&config.directory).map_err(|source| LoggingError::Directory {
        path: config.directory.clone(),
        source,
    })?;

    let filter = build_filter(&config.level)?;

    let appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_timer(local_timer());

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(local_timer())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_directory: config.directory.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_file() {
        let mut file = ConfigFile::default();
        file.logging.level = "debug".to_string();
        let config = LoggingConfig::from(&file).with_stderr(true);
        assert_eq!(config.level, "debug");
        assert!(config.stderr);
        assert_eq!(config.file_prefix, "trackdeck.log");
    }

    #[test]
    fn test_filter_rejects_garbage_level() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_err() {
            assert!(build_filter("info").is_ok());
            assert!(build_filter("trackdeck=debug,warn").is_ok());
            assert!(matches!(
                build_filter("[[not a filter"),
                Err(LoggingError::Filter(_))
            ));
        }
    }
}
