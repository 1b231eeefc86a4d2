//! Map engine configuration.

use std::time::Duration;

use super::renderer::{Surface, Viewport};
use crate::config::{
    ConfigFile, DEFAULT_BOOTSTRAP_DEADLINE_SECS, DEFAULT_FALLBACK_STYLE_URL,
    DEFAULT_FALLBACK_TILE_URL, DEFAULT_MAX_POINTS, DEFAULT_STYLE_URL,
};

/// Configuration for one map instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Style document requested first.
    pub style_url: String,
    /// Known-good style used for the single retry.
    pub fallback_style_url: String,
    /// Raster tile template of the fallback renderer.
    pub fallback_tile_url: String,
    /// Time allowed from renderer creation until the style has loaded.
    pub bootstrap_deadline: Duration,
    /// Maximum number of markers rendered at once.
    pub max_points: usize,
    /// Initial surface. A zero size defers bootstrap until a resize.
    pub surface: Surface,
    pub initial_center: (f64, f64),
    pub initial_zoom: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            style_url: DEFAULT_STYLE_URL.to_string(),
            fallback_style_url: DEFAULT_FALLBACK_STYLE_URL.to_string(),
            fallback_tile_url: DEFAULT_FALLBACK_TILE_URL.to_string(),
            bootstrap_deadline: Duration::from_secs(DEFAULT_BOOTSTRAP_DEADLINE_SECS),
            max_points: DEFAULT_MAX_POINTS,
            surface: Surface::new(1024, 768),
            initial_center: (30.0, 0.0),
            initial_zoom: 2.0,
        }
    }
}

impl MapConfig {
    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.bootstrap_deadline = deadline;
        self
    }

    pub fn with_styles(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.style_url = primary.into();
        self.fallback_style_url = secondary.into();
        self
    }

    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Camera every renderer starts with.
    pub fn initial_viewport(&self, surface: Surface) -> Viewport {
        Viewport::new(self.initial_center, self.initial_zoom, surface)
    }
}

impl From<&ConfigFile> for MapConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            style_url: config.map.style_url.clone(),
            fallback_style_url: config.map.fallback_style_url.clone(),
            fallback_tile_url: config.map.fallback_tile_url.clone(),
            bootstrap_deadline: Duration::from_secs(config.map.bootstrap_deadline),
            max_points: config.map.max_points,
            surface: Surface::new(config.map.width, config.map.height),
            ..Self::default()
        }
    }
}
