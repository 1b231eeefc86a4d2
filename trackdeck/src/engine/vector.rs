//! Primary (accelerated) vector renderer.
//!
//! Draws the style background and the marker sprites of the engine library
//! into a `tiny-skia` frame. The frame is what a GPU surface would present;
//! here it backs first paint and PNG export.

use std::sync::Arc;

use parking_lot::Mutex;
use tiny_skia::{Color, Pixmap, PixmapPaint, Transform};
use tracing::{debug, info};

use super::library::MARKER_SIZE;
use super::renderer::{
    MapRenderer, MarkerFeature, PrimaryEngine, PrimaryFactory, RendererHandle, RendererKind,
    Surface, Viewport,
};
use super::style::{fetch_style, parse_color, StyleDocument};
use super::{EngineError, EngineLibrary, EngineResult};
use crate::http::AsyncHttpClient;
use crate::model::GeoBounds;
use crate::BoxFuture;

/// Background used until a style provides one.
const DEFAULT_BACKGROUND: (u8, u8, u8, u8) = (0xf2, 0xef, 0xe9, 0xff);

#[derive(Debug)]
struct VectorState {
    style: Option<StyleDocument>,
    features: Vec<MarkerFeature>,
    viewport: Viewport,
    frames_painted: u64,
    released: bool,
}

/// The primary renderer.
pub struct VectorRenderer {
    http: Arc<dyn AsyncHttpClient>,
    library: Arc<EngineLibrary>,
    state: Mutex<VectorState>,
}

impl VectorRenderer {
    pub fn new(
        http: Arc<dyn AsyncHttpClient>,
        library: Arc<EngineLibrary>,
        viewport: Viewport,
    ) -> EngineResult<Self> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(EngineError::Create(format!(
                "surface {}x{} has no area",
                viewport.width, viewport.height
            )));
        }
        Ok(Self {
            http,
            library,
            state: Mutex::new(VectorState {
                style: None,
                features: Vec::new(),
                viewport,
                frames_painted: 0,
                released: false,
            }),
        })
    }

    /// Name of the applied style.
    pub fn style_name(&self) -> Option<String> {
        self.state
            .lock()
            .style
            .as_ref()
            .map(|s| s.display_name().to_string())
    }

    pub fn frames_painted(&self) -> u64 {
        self.state.lock().frames_painted
    }

    /// Rasterize the current frame.
    pub fn render_frame(&self) -> EngineResult<Pixmap> {
        let (background, features, viewport) = {
            let state = self.state.lock();
            if state.released {
                return Err(EngineError::Disposed);
            }
            let background = state
                .style
                .as_ref()
                .and_then(|s| s.background_color())
                .and_then(|c| parse_color(&c))
                .unwrap_or(DEFAULT_BACKGROUND);
            (background, state.features.clone(), state.viewport)
        };

        let mut pixmap = Pixmap::new(viewport.width, viewport.height).ok_or_else(|| {
            EngineError::Runtime(format!(
                "cannot allocate {}x{} frame",
                viewport.width, viewport.height
            ))
        })?;
        let (r, g, b, a) = background;
        pixmap.fill(Color::from_rgba8(r, g, b, a));

        let half = (MARKER_SIZE / 2) as f64;
        let limit_x = viewport.width as f64 + half;
        let limit_y = viewport.height as f64 + half;
        for feature in &features {
            let (x, y) = viewport.to_screen(feature.lat, feature.lon);
            if x < -half || y < -half || x > limit_x || y > limit_y {
                continue;
            }
            pixmap.draw_pixmap(
                (x - half).round() as i32,
                (y - half).round() as i32,
                self.library.marker(feature.kind).as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }

        Ok(pixmap)
    }
}

impl MapRenderer for VectorRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Primary
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
        debug!(zoom = state.viewport.zoom, "Vector renderer fitted to bounds");
    }

    fn resize(&self, surface: Surface) {
        let mut state = self.state.lock();
        state.viewport = state.viewport.resized(surface);
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn export_png(&self) -> BoxFuture<'_, EngineResult<Vec<u8>>> {
        Box::pin(async move {
            self.render_frame()?
                .encode_png()
                .map_err(|e| EngineError::Export(e.to_string()))
        })
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if !state.released {
            state.released = true;
            state.features.clear();
            state.style = None;
            debug!("Vector renderer released");
        }
    }

    fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

impl PrimaryEngine for VectorRenderer {
    fn request_style(&self, url: String) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            let style = fetch_style(self.http.as_ref(), &url).await?;
            let mut state = self.state.lock();
            if state.released {
                return Err(EngineError::Disposed);
            }
            info!(style = style.display_name(), url = %url, "Style loaded");
            state.style = Some(style);
            Ok(())
        })
    }

    fn style_loaded(&self) -> bool {
        self.state.lock().style.is_some()
    }

    fn paint(&self) -> EngineResult<()> {
        if !self.style_loaded() {
            return Err(EngineError::Runtime("paint before style load".to_string()));
        }
        self.render_frame()?;
        self.state.lock().frames_painted += 1;
        Ok(())
    }

    fn into_renderer(self: Arc<Self>) -> RendererHandle {
        self
    }
}

/// Builds [`VectorRenderer`]s that fetch styles through `http`.
pub struct VectorRendererFactory {
    http: Arc<dyn AsyncHttpClient>,
}

impl VectorRendererFactory {
    pub fn new(http: Arc<dyn AsyncHttpClient>) -> Self {
        Self { http }
    }
}

impl PrimaryFactory for VectorRendererFactory {
    fn create(
        &self,
        library: Arc<EngineLibrary>,
        viewport: Viewport,
    ) -> EngineResult<Arc<dyn PrimaryEngine>> {
        let renderer = VectorRenderer::new(Arc::clone(&self.http), library, viewport)?;
        Ok(Arc::new(renderer))
    }
}
