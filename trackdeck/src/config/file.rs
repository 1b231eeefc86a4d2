//! INI configuration file.
//!
//! The configuration lives at `~/.trackdeck/config.ini`. Missing files and
//! missing keys fall back to defaults, so a fresh install works without any
//! configuration at all.
//!
//! ```ini
//! [feed]
//! base_url = http://127.0.0.1:8000/api/tracker
//! mode = combined
//! refresh_interval = 10
//! request_timeout = 15
//!
//! [map]
//! style_url = https://tiles.openfreemap.org/styles/liberty
//! fallback_style_url = https://demotiles.maplibre.org/style.json
//! fallback_tile_url = https://tile.openstreetmap.org/{z}/{x}/{y}.png
//! bootstrap_deadline = 8
//! max_points = 200
//! width = 1024
//! height = 768
//!
//! [diagnostics]
//! probe_timeout = 6
//!
//! [logging]
//! level = info
//! directory = ~/.trackdeck/logs
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use super::{config_directory, config_file_path, ConfigError};
use crate::model::FeedMode;

/// Default point-feed base URL.
pub const DEFAULT_FEED_BASE_URL: &str = "http://127.0.0.1:8000/api/tracker";

/// Default primary style document.
pub const DEFAULT_STYLE_URL: &str = "https://tiles.openfreemap.org/styles/liberty";

/// Default secondary (known-good) style document.
pub const DEFAULT_FALLBACK_STYLE_URL: &str = "https://demotiles.maplibre.org/style.json";

/// Default raster tile template for the fallback renderer.
pub const DEFAULT_FALLBACK_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Default polling interval in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default bootstrap deadline in seconds.
pub const DEFAULT_BOOTSTRAP_DEADLINE_SECS: u64 = 8;

/// Default maximum number of simultaneously rendered points.
pub const DEFAULT_MAX_POINTS: usize = 200;

/// Default per-check probe timeout in seconds.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 6;

/// `[feed]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub base_url: String,
    pub mode: FeedMode,
    pub refresh_interval: u64,
    pub request_timeout: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            mode: FeedMode::Combined,
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// `[map]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub style_url: String,
    pub fallback_style_url: String,
    pub fallback_tile_url: String,
    pub bootstrap_deadline: u64,
    pub max_points: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            style_url: DEFAULT_STYLE_URL.to_string(),
            fallback_style_url: DEFAULT_FALLBACK_STYLE_URL.to_string(),
            fallback_tile_url: DEFAULT_FALLBACK_TILE_URL.to_string(),
            bootstrap_deadline: DEFAULT_BOOTSTRAP_DEADLINE_SECS,
            max_points: DEFAULT_MAX_POINTS,
            width: 1024,
            height: 768,
        }
    }
}

/// `[diagnostics]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsSettings {
    pub probe_timeout: u64,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: config_directory().join("logs"),
        }
    }
}

/// The complete configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub feed: FeedSettings,
    pub map: MapSettings,
    pub diagnostics: DiagnosticsSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load the configuration from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load the configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_ini(&ini)
    }

    /// Build a configuration from a parsed INI document.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("feed")) {
            if let Some(v) = section.get("base_url") {
                config.feed.base_url = v.trim().to_string();
            }
            if let Some(v) = section.get("mode") {
                config.feed.mode = parse_value("feed.mode", v)?;
            }
            if let Some(v) = section.get("refresh_interval") {
                config.feed.refresh_interval = parse_positive("feed.refresh_interval", v)?;
            }
            if let Some(v) = section.get("request_timeout") {
                config.feed.request_timeout = parse_positive("feed.request_timeout", v)?;
            }
        }

        if let Some(section) = ini.section(Some("map")) {
            if let Some(v) = section.get("style_url") {
                config.map.style_url = v.trim().to_string();
            }
            if let Some(v) = section.get("fallback_style_url") {
                config.map.fallback_style_url = v.trim().to_string();
            }
            if let Some(v) = section.get("fallback_tile_url") {
                config.map.fallback_tile_url = v.trim().to_string();
            }
            if let Some(v) = section.get("bootstrap_deadline") {
                config.map.bootstrap_deadline = parse_positive("map.bootstrap_deadline", v)?;
            }
            if let Some(v) = section.get("max_points") {
                config.map.max_points = parse_positive("map.max_points", v)?;
            }
            if let Some(v) = section.get("width") {
                config.map.width = parse_positive("map.width", v)?;
            }
            if let Some(v) = section.get("height") {
                config.map.height = parse_positive("map.height", v)?;
            }
        }

        if let Some(section) = ini.section(Some("diagnostics")) {
            if let Some(v) = section.get("probe_timeout") {
                config.diagnostics.probe_timeout = parse_positive("diagnostics.probe_timeout", v)?;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("level") {
                config.logging.level = v.trim().to_string();
            }
            if let Some(v) = section.get("directory") {
                config.logging.directory = expand_tilde(v.trim());
            }
        }

        Ok(config)
    }

    /// Render the configuration as an INI document.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("feed"))
            .set("base_url", self.feed.base_url.as_str())
            .set("mode", self.feed.mode.as_query_value())
            .set("refresh_interval", self.feed.refresh_interval.to_string())
            .set("request_timeout", self.feed.request_timeout.to_string());

        ini.with_section(Some("map"))
            .set("style_url", self.map.style_url.as_str())
            .set("fallback_style_url", self.map.fallback_style_url.as_str())
            .set("fallback_tile_url", self.map.fallback_tile_url.as_str())
            .set("bootstrap_deadline", self.map.bootstrap_deadline.to_string())
            .set("max_points", self.map.max_points.to_string())
            .set("width", self.map.width.to_string())
            .set("height", self.map.height.to_string());

        ini.with_section(Some("diagnostics"))
            .set("probe_timeout", self.diagnostics.probe_timeout.to_string());

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str())
            .set(
                "directory",
                self.logging.directory.to_string_lossy().to_string(),
            );

        ini
    }

    /// Save the configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save the configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

pub(crate) fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed: T = parse_value(key, value)?;
    if parsed <= T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

pub(crate) fn expand_tilde(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}
