//! Engine library loading.
//!
//! The engine library holds the process-wide resources of the primary
//! renderer: pre-rasterized marker sprites and the adapter it was built
//! for. Loading it is comparatively expensive, so [`SharedEngineLoader`]
//! makes it a lazily initialized singleton. A failed load is not cached;
//! the next map instance tries again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tokio::sync::OnceCell;
use tracing::info;

use super::{Capability, EngineError, EngineResult};
use crate::model::PointKind;
use crate::BoxFuture;

/// Edge length of a marker sprite in pixels.
pub const MARKER_SIZE: u32 = 14;

/// Process-wide resources of the primary renderer.
#[derive(Debug)]
pub struct EngineLibrary {
    capability: Capability,
    flight_marker: Pixmap,
    ship_marker: Pixmap,
}

impl EngineLibrary {
    /// Rasterize the marker sprites.
    pub fn build(capability: Capability) -> EngineResult<Self> {
        Ok(Self {
            capability,
            flight_marker: flight_sprite()?,
            ship_marker: ship_sprite()?,
        })
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Sprite for a point kind.
    pub fn marker(&self, kind: PointKind) -> &Pixmap {
        match kind {
            PointKind::Flight => &self.flight_marker,
            PointKind::Ship => &self.ship_marker,
        }
    }
}

fn sprite_canvas() -> EngineResult<Pixmap> {
    Pixmap::new(MARKER_SIZE, MARKER_SIZE)
        .ok_or_else(|| EngineError::EngineLoad("cannot allocate marker sprite".to_string()))
}

fn outline() -> (Paint<'static>, Stroke) {
    let mut paint = Paint::default();
    paint.set_color(Color::WHITE);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 1.5,
        ..Stroke::default()
    };
    (paint, stroke)
}

fn flight_sprite() -> EngineResult<Pixmap> {
    let mut pixmap = sprite_canvas()?;
    let size = MARKER_SIZE as f32;
    let mut pb = PathBuilder::new();
    pb.move_to(size / 2.0, 1.0);
    pb.line_to(size - 1.5, size - 1.5);
    pb.line_to(size / 2.0, size * 0.7);
    pb.line_to(1.5, size - 1.5);
    pb.close();
    let path = pb
        .finish()
        .ok_or_else(|| EngineError::EngineLoad("invalid flight marker path".to_string()))?;

    let mut fill = Paint::default();
    fill.set_color_rgba8(0x1e, 0x88, 0xe5, 0xff);
    fill.anti_alias = true;
    pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);

    let (paint, stroke) = outline();
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    Ok(pixmap)
}

fn ship_sprite() -> EngineResult<Pixmap> {
    let mut pixmap = sprite_canvas()?;
    let size = MARKER_SIZE as f32;
    let path = PathBuilder::from_circle(size / 2.0, size / 2.0, size / 2.0 - 1.5)
        .ok_or_else(|| EngineError::EngineLoad("invalid ship marker path".to_string()))?;

    let mut fill = Paint::default();
    fill.set_color_rgba8(0x00, 0x89, 0x7b, 0xff);
    fill.anti_alias = true;
    pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);

    let (paint, stroke) = outline();
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    Ok(pixmap)
}

/// Loads the engine library.
pub trait EngineLoader: Send + Sync {
    fn load(&self, capability: Capability) -> BoxFuture<'_, EngineResult<Arc<EngineLibrary>>>;
}

/// Builds a fresh library on every call.
#[derive(Debug, Default, Clone)]
pub struct DefaultEngineLoader;

impl EngineLoader for DefaultEngineLoader {
    fn load(&self, capability: Capability) -> BoxFuture<'_, EngineResult<Arc<EngineLibrary>>> {
        Box::pin(async move {
            let library = tokio::task::spawn_blocking(move || EngineLibrary::build(capability))
                .await
                .map_err(|e| EngineError::EngineLoad(e.to_string()))??;
            Ok(Arc::new(library))
        })
    }
}

/// Memoizes a loader: the first successful load is shared by every later
/// caller. Concurrent callers wait for the same initialization.
pub struct SharedEngineLoader {
    inner: Arc<dyn EngineLoader>,
    cell: OnceCell<Arc<EngineLibrary>>,
    attempts: AtomicUsize,
}

impl SharedEngineLoader {
    pub fn new(inner: Arc<dyn EngineLoader>) -> Self {
        Self {
            inner,
            cell: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// The process-wide loader.
    pub fn global() -> Arc<SharedEngineLoader> {
        static GLOBAL: OnceLock<Arc<SharedEngineLoader>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            Arc::new(SharedEngineLoader::new(Arc::new(DefaultEngineLoader)))
        }))
    }

    /// Number of times the inner loader has been invoked.
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

impl EngineLoader for SharedEngineLoader {
    fn load(&self, capability: Capability) -> BoxFuture<'_, EngineResult<Arc<EngineLibrary>>> {
        Box::pin(async move {
            let library = self
                .cell
                .get_or_try_init(|| async {
                    self.attempts.fetch_add(1, Ordering::SeqCst);
                    info!(adapter = %capability, "Loading map engine library");
                    self.inner.load(capability.clone()).await
                })
                .await?;
            Ok(Arc::clone(library))
        })
    }
}
