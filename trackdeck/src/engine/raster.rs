//! Fallback raster tile renderer.
//!
//! Needs no acceleration: frames are composed from public raster tiles with
//! `staticmap`, markers drawn as circles. Construction is immediate.

use parking_lot::Mutex;
use staticmap::tools::{CircleBuilder, Color};
use staticmap::StaticMapBuilder;
use tracing::debug;

use super::renderer::{
    FallbackFactory, MapRenderer, MarkerFeature, RendererHandle, RendererKind, Surface, Viewport,
};
use super::{EngineError, EngineResult};
use crate::coord::{MAX_ZOOM, MIN_ZOOM};
use crate::model::{GeoBounds, PointKind};
use crate::BoxFuture;

/// Marker radius in pixels.
const MARKER_RADIUS: f32 = 5.0;

#[derive(Debug)]
struct RasterState {
    features: Vec<MarkerFeature>,
    viewport: Viewport,
    released: bool,
}

/// Raster tile renderer.
pub struct RasterTileRenderer {
    tile_url: String,
    state: Mutex<RasterState>,
}

impl RasterTileRenderer {
    /// Create a renderer for a `{z}/{x}/{y}` tile template.
    pub fn new(tile_url: impl Into<String>, viewport: Viewport) -> EngineResult<Self> {
        let tile_url = tile_url.into();
        validate_template(&tile_url)?;
        Ok(Self {
            tile_url,
            state: Mutex::new(RasterState {
                features: Vec::new(),
                viewport,
                released: false,
            }),
        })
    }

    pub fn tile_url(&self) -> &str {
        &self.tile_url
    }
}

fn validate_template(template: &str) -> EngineResult<()> {
    for token in ["{z}", "{x}", "{y}"] {
        if !template.contains(token) {
            return Err(EngineError::Create(format!(
                "tile template '{}' lacks {}",
                template, token
            )));
        }
    }
    Ok(())
}

fn marker_color(kind: PointKind) -> Color {
    match kind {
        PointKind::Flight => Color::new(true, 0x1e, 0x88, 0xe5, 0xff),
        PointKind::Ship => Color::new(true, 0x00, 0x89, 0x7b, 0xff),
    }
}

fn render_static_map(
    tile_url: &str,
    viewport: Viewport,
    features: &[MarkerFeature],
) -> EngineResult<Vec<u8>> {
    let zoom = viewport
        .zoom
        .round()
        .clamp(MIN_ZOOM as f64, MAX_ZOOM as f64) as u8;

    let mut map = StaticMapBuilder::default()
        .width(viewport.width)
        .height(viewport.height)
        .url_template(tile_url)
        .zoom(zoom)
        .lat_center(viewport.center.0)
        .lon_center(viewport.center.1)
        .build()
        .map_err(|e| EngineError::Export(e.to_string()))?;

    for feature in features {
        let circle = CircleBuilder::default()
            .lat_coordinate(feature.lat)
            .lon_coordinate(feature.lon)
            .color(marker_color(feature.kind))
            .radius(MARKER_RADIUS)
            .build()
            .map_err(|e| EngineError::Export(e.to_string()))?;
        map.add_tool(circle);
    }

    map.encode_png()
        .map_err(|e| EngineError::Export(e.to_string()))
}

impl MapRenderer for RasterTileRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Fallback
    }

    fn set_features(&self, features: Vec<MarkerFeature>) {
        let mut state = self.state.lock();
        if !state.released {
            state.features = features;
        }
    }

    fn features(&self) -> Vec<MarkerFeature> {
        self.state.lock().features.clone()
    }

    fn fit_bounds(&self, bounds: GeoBounds) {
        let mut state = self.state.lock();
        state.viewport = state.viewport.fitted(&bounds);
        debug!(zoom = state.viewport.zoom, "Raster renderer fitted to bounds");
    }

    fn resize(&self, surface: Surface) {
        let mut state = self.state.lock();
        state.viewport = state.viewport.resized(surface);
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn export_png(&self) -> BoxFuture<'_, EngineResult<Vec<u8>>> {
        let snapshot = {
            let state = self.state.lock();
            (!state.released).then(|| (state.viewport, state.features.clone()))
        };
        let tile_url = self.tile_url.clone();

        Box::pin(async move {
            let (viewport, features) = snapshot.ok_or(EngineError::Disposed)?;
            // staticmap downloads tiles with blocking I/O.
            tokio::task::spawn_blocking(move || render_static_map(&tile_url, viewport, &features))
                .await
                .map_err(|e| EngineError::Export(e.to_string()))?
        })
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        state.features.clear();
    }

    fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

/// Builds [`RasterTileRenderer`]s for one tile template.
#[derive(Debug, Clone)]
pub struct RasterTileFactory {
    tile_url: String,
}

impl RasterTileFactory {
    pub fn new(tile_url: impl Into<String>) -> Self {
        Self {
            tile_url: tile_url.into(),
        }
    }
}

impl FallbackFactory for RasterTileFactory {
    fn create(&self, viewport: Viewport) -> EngineResult<RendererHandle> {
        let renderer = RasterTileRenderer::new(self.tile_url.clone(), viewport)?;
        Ok(std::sync::Arc::new(renderer))
    }
}
