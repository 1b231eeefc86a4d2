//! Addressable configuration keys for `config get` / `config set`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::file::{expand_tilde, parse_positive, parse_value, ConfigFile};
use super::ConfigError;

/// Errors from resolving or setting a key.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Every user-settable configuration key, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    FeedBaseUrl,
    FeedMode,
    FeedRefreshInterval,
    FeedRequestTimeout,
    MapStyleUrl,
    MapFallbackStyleUrl,
    MapFallbackTileUrl,
    MapBootstrapDeadline,
    MapMaxPoints,
    MapWidth,
    MapHeight,
    DiagnosticsProbeTimeout,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::FeedBaseUrl,
            ConfigKey::FeedMode,
            ConfigKey::FeedRefreshInterval,
            ConfigKey::FeedRequestTimeout,
            ConfigKey::MapStyleUrl,
            ConfigKey::MapFallbackStyleUrl,
            ConfigKey::MapFallbackTileUrl,
            ConfigKey::MapBootstrapDeadline,
            ConfigKey::MapMaxPoints,
            ConfigKey::MapWidth,
            ConfigKey::MapHeight,
            ConfigKey::DiagnosticsProbeTimeout,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    /// INI section holding this key.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::FeedBaseUrl
            | ConfigKey::FeedMode
            | ConfigKey::FeedRefreshInterval
            | ConfigKey::FeedRequestTimeout => "feed",
            ConfigKey::MapStyleUrl
            | ConfigKey::MapFallbackStyleUrl
            | ConfigKey::MapFallbackTileUrl
            | ConfigKey::MapBootstrapDeadline
            | ConfigKey::MapMaxPoints
            | ConfigKey::MapWidth
            | ConfigKey::MapHeight => "map",
            ConfigKey::DiagnosticsProbeTimeout => "diagnostics",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::FeedBaseUrl => "base_url",
            ConfigKey::FeedMode => "mode",
            ConfigKey::FeedRefreshInterval => "refresh_interval",
            ConfigKey::FeedRequestTimeout => "request_timeout",
            ConfigKey::MapStyleUrl => "style_url",
            ConfigKey::MapFallbackStyleUrl => "fallback_style_url",
            ConfigKey::MapFallbackTileUrl => "fallback_tile_url",
            ConfigKey::MapBootstrapDeadline => "bootstrap_deadline",
            ConfigKey::MapMaxPoints => "max_points",
            ConfigKey::MapWidth => "width",
            ConfigKey::MapHeight => "height",
            ConfigKey::DiagnosticsProbeTimeout => "probe_timeout",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// Fully qualified `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as displayed by `config get`.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::FeedBaseUrl => config.feed.base_url.clone(),
            ConfigKey::FeedMode => config.feed.mode.to_string(),
            ConfigKey::FeedRefreshInterval => config.feed.refresh_interval.to_string(),
            ConfigKey::FeedRequestTimeout => config.feed.request_timeout.to_string(),
            ConfigKey::MapStyleUrl => config.map.style_url.clone(),
            ConfigKey::MapFallbackStyleUrl => config.map.fallback_style_url.clone(),
            ConfigKey::MapFallbackTileUrl => config.map.fallback_tile_url.clone(),
            ConfigKey::MapBootstrapDeadline => config.map.bootstrap_deadline.to_string(),
            ConfigKey::MapMaxPoints => config.map.max_points.to_string(),
            ConfigKey::MapWidth => config.map.width.to_string(),
            ConfigKey::MapHeight => config.map.height.to_string(),
            ConfigKey::DiagnosticsProbeTimeout => config.diagnostics.probe_timeout.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config.logging.directory.to_string_lossy().to_string(),
        }
    }

    /// Validate and store a value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let name = self.name();
        let trimmed = value.trim();
        match self {
            ConfigKey::FeedBaseUrl => config.feed.base_url = trimmed.to_string(),
            ConfigKey::FeedMode => config.feed.mode = parse_value(&name, value)?,
            ConfigKey::FeedRefreshInterval => {
                config.feed.refresh_interval = parse_positive(&name, value)?
            }
            ConfigKey::FeedRequestTimeout => {
                config.feed.request_timeout = parse_positive(&name, value)?
            }
            ConfigKey::MapStyleUrl => config.map.style_url = trimmed.to_string(),
            ConfigKey::MapFallbackStyleUrl => config.map.fallback_style_url = trimmed.to_string(),
            ConfigKey::MapFallbackTileUrl => config.map.fallback_tile_url = trimmed.to_string(),
            ConfigKey::MapBootstrapDeadline => {
                config.map.bootstrap_deadline = parse_positive(&name, value)?
            }
            ConfigKey::MapMaxPoints => config.map.max_points = parse_positive(&name, value)?,
            ConfigKey::MapWidth => config.map.width = parse_positive(&name, value)?,
            ConfigKey::MapHeight => config.map.height = parse_positive(&name, value)?,
            ConfigKey::DiagnosticsProbeTimeout => {
                config.diagnostics.probe_timeout = parse_positive(&name, value)?
            }
            ConfigKey::LoggingLevel => config.logging.level = trimmed.to_string(),
            ConfigKey::LoggingDirectory => config.logging.directory = expand_tilde(trimmed),
        }
        Ok(())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}
