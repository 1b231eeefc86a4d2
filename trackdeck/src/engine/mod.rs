//! Map engine bootstrap.
//!
//! Brings up the accelerated vector renderer for a map surface and falls
//! back to a raster tile renderer when the hardware capability is missing,
//! the engine fails to load, the style cannot be fetched, or the bootstrap
//! deadline passes first.
//!
//! - [`BootstrapMachine`]: pure transition rules
//! - [`MapBootstrap`]: async supervisor, one per mounted surface
//! - [`MapRenderer`]: what consumers draw through, whichever engine is active

mod bootstrap;
mod capability;
mod config;
mod error;
mod library;
mod raster;
mod renderer;
mod state;
mod style;
mod vector;

pub use bootstrap::{BootstrapDeps, MapBootstrap};
#[cfg(feature = "gpu")]
pub use capability::GpuCapabilityProbe;
pub use capability::{default_probe, Capability, CapabilityProbe, StaticCapability};
pub use config::MapConfig;
pub use error::{EngineError, EngineResult};
pub use library::{DefaultEngineLoader, EngineLibrary, EngineLoader, SharedEngineLoader};
pub use raster::{RasterTileFactory, RasterTileRenderer};
pub use renderer::{
    FallbackFactory, MapRenderer, MarkerFeature, PrimaryEngine, PrimaryFactory, RendererHandle,
    RendererKind, Surface, Viewport, FIT_MAX_ZOOM, FIT_PADDING_PX,
};
pub use state::{BootstrapEvent, BootstrapMachine, Command, EngineState};
pub use style::{
    fetch_style, parse_color, resolve_url, StyleDocument, StyleLayer, StyleSource, TileJson,
    DEFAULT_FONT_STACK,
};
pub use vector::{VectorRenderer, VectorRendererFactory};
