//! CLI error type.

use std::fmt;
use std::io;

use trackdeck::config::ConfigError;
use trackdeck::credential::CredentialError;
use trackdeck::logging::LoggingError;
use trackdeck::session::SessionError;

/// Errors surfaced by CLI commands. Each maps to a non-zero exit code.
#[derive(Debug)]
pub enum CliError {
    /// Invalid arguments or configuration values.
    Config(String),
    /// Reading or writing the configuration file failed.
    ConfigFile(ConfigError),
    Credential(CredentialError),
    Logging(LoggingError),
    Session(SessionError),
    /// The async runtime could not be created.
    Runtime(io::Error),
    /// Terminal setup or drawing failed.
    Terminal(io::Error),
    /// Exporting a frame failed.
    Export(String),
    /// Something did not happen in time.
    Timeout(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) => 2,
            CliError::Timeout(_) => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::Credential(e) => write!(f, "Credential error: {}", e),
            CliError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            CliError::Session(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Terminal(e) => write!(f, "Terminal error: {}", e),
            CliError::Export(msg) => write!(f, "Export failed: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timed out: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Credential(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Runtime(e) | CliError::Terminal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<CredentialError> for CliError {
    fn from(e: CredentialError) -> Self {
        CliError::Credential(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}
