//! Renderer abstractions shared by the primary and fallback engines.

use std::fmt;
use std::sync::Arc;

use super::{EngineLibrary, EngineResult};
use crate::coord;
use crate::model::{GeoBounds, PointKind};
use crate::BoxFuture;

/// Pixels kept free around fitted bounds.
pub const FIT_PADDING_PX: u32 = 32;

/// Highest zoom a fit may choose.
pub const FIT_MAX_ZOOM: f64 = 14.0;

/// Drawable area of the map view, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A surface can host a renderer only once it has a non-zero size.
    pub fn is_measured(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Camera of a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// `(lat, lon)` at the centre of the surface.
    pub center: (f64, f64),
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(center: (f64, f64), zoom: f64, surface: Surface) -> Self {
        Self {
            center,
            zoom,
            width: surface.width,
            height: surface.height,
        }
    }

    /// Same camera on a resized surface.
    pub fn resized(self, surface: Surface) -> Self {
        Self {
            width: surface.width,
            height: surface.height,
            ..self
        }
    }

    /// Camera framing `bounds` with [`FIT_PADDING_PX`] on every side.
    pub fn fitted(self, bounds: &GeoBounds) -> Self {
        let zoom =
            coord::zoom_for_bounds(bounds, self.width, self.height, FIT_PADDING_PX, FIT_MAX_ZOOM);
        Self {
            center: bounds.center(),
            zoom,
            ..self
        }
    }

    /// Pixel position of a coordinate relative to the surface's top-left.
    pub fn to_screen(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (cx, cy) = coord::project(self.center.0, self.center.1, self.zoom);
        let (x, y) = coord::project(lat, lon, self.zoom);
        (
            x - cx + self.width as f64 / 2.0,
            y - cy + self.height as f64 / 2.0,
        )
    }

    /// Geographic area visible through this camera.
    pub fn visible_bounds(&self) -> GeoBounds {
        coord::visible_bounds(self.center, self.zoom, self.width, self.height)
    }
}

/// One rendered marker, keyed by the point id.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerFeature {
    pub id: String,
    pub kind: PointKind,
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

impl MarkerFeature {
    pub fn new(id: impl Into<String>, kind: PointKind, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            lat,
            lon,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Which renderer implementation is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    /// Accelerated vector renderer.
    Primary,
    /// Raster tile renderer.
    Fallback,
}

impl RendererKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::Primary => "vector",
            RendererKind::Fallback => "raster",
        }
    }
}

/// Operations Render Sync and the dashboard need from any renderer.
pub trait MapRenderer: Send + Sync {
    fn kind(&self) -> RendererKind;

    /// Replace the whole marker set.
    fn set_features(&self, features: Vec<MarkerFeature>);

    /// The current marker set, in insertion order.
    fn features(&self) -> Vec<MarkerFeature>;

    /// Ids of the current markers.
    fn feature_ids(&self) -> Vec<String> {
        self.features().into_iter().map(|f| f.id).collect()
    }

    /// Move the camera so `bounds` is fully visible.
    fn fit_bounds(&self, bounds: GeoBounds);

    /// Recompute the viewport for a new surface size.
    fn resize(&self, surface: Surface);

    fn viewport(&self) -> Viewport;

    /// Render the current frame as PNG.
    fn export_png(&self) -> BoxFuture<'_, EngineResult<Vec<u8>>>;

    /// Free resources. Later calls are no-ops.
    fn release(&self);

    fn is_released(&self) -> bool;
}

/// Shared handle to the active renderer.
pub type RendererHandle = Arc<dyn MapRenderer>;

/// The accelerated renderer driven through the bootstrap.
pub trait PrimaryEngine: MapRenderer {
    /// Fetch and apply a style document.
    fn request_style(&self, url: String) -> BoxFuture<'_, EngineResult<()>>;

    /// Whether a style has been applied.
    fn style_loaded(&self) -> bool;

    /// Draw the first frame.
    fn paint(&self) -> EngineResult<()>;

    /// Convert to a plain renderer handle.
    fn into_renderer(self: Arc<Self>) -> RendererHandle;
}

/// Builds primary renderers against a loaded engine library.
pub trait PrimaryFactory: Send + Sync {
    fn create(
        &self,
        library: Arc<EngineLibrary>,
        viewport: Viewport,
    ) -> EngineResult<Arc<dyn PrimaryEngine>>;
}

/// Builds fallback renderers.
pub trait FallbackFactory: Send + Sync {
    fn create(&self, viewport: Viewport) -> EngineResult<RendererHandle>;
}
