//! trackdeck - real-time flight and ship tracking core
//!
//! Acquires a live point feed (push channel plus polling), boots a map
//! renderer with a supervised fallback, and keeps the rendered markers in
//! step with the most recent snapshot.
//!
//! - [`feed`]: stream acquisition and the generation-guarded active snapshot
//! - [`engine`]: map engine bootstrap state machine and renderers
//! - [`render_sync`]: snapshot to marker projection
//! - [`diagnostics`]: map resource reachability probe
//! - [`status`]: human-readable status lines
//! - [`session`]: all of the above for one mounted view

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod coord;
pub mod credential;
pub mod diagnostics;
pub mod engine;
pub mod feed;
pub mod http;
pub mod logging;
pub mod model;
pub mod render_sync;
pub mod session;
pub mod status;

/// A boxed future, used at async trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
