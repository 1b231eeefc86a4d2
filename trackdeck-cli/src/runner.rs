//! Shared setup for commands that talk to the feed or the map engine.
//!
//! Loads the configuration, installs logging and owns the Tokio runtime.

use std::future::Future;

use tokio::runtime::Runtime;
use tracing::info;
use trackdeck::config::{config_file_path, ConfigFile};
use trackdeck::logging::{init_logging, LoggingConfig, LoggingGuard};

use crate::error::CliError;

pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load configuration and start logging. `stderr_logging` mirrors log
    /// output to stderr; the dashboard turns it off.
    pub fn new(stderr_logging: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load().unwrap_or_default();
        let logging = init_logging(&LoggingConfig::from(&config).with_stderr(stderr_logging))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("trackdeck-worker")
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = trackdeck::VERSION,
            command,
            config = %config_file_path().display(),
            feed = %self.config.feed.base_url,
            "trackdeck starting"
        );
    }
}
