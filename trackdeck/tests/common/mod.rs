//! Scripted collaborators shared by the integration tests.
//!
//! Everything here goes through the public trait seams only: snapshot
//! sources, push connectors, the HTTP client and the engine loader.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;

use trackdeck::engine::{
    BootstrapDeps, Capability, CapabilityProbe, EngineLibrary, EngineLoader, EngineResult,
    RasterTileFactory, StaticCapability, VectorRendererFactory,
};
use trackdeck::feed::{FeedError, FeedResult, PushConnector, SnapshotSource, SnapshotStream};
use trackdeck::http::{AsyncHttpClient, HttpError, HttpResponse};
use trackdeck::model::{FeedMode, PointKind, TrackerPoint, TrackerSnapshot};
use trackdeck::BoxFuture;

pub const PRIMARY_STYLE: &str = "https://styles.example.com/primary.json";
pub const SECONDARY_STYLE: &str = "https://styles.example.com/secondary.json";
pub const TILE_URL: &str = "https://tiles.example.com/{z}/{x}/{y}.png";
pub const STYLE_BODY: &[u8] = br#"{"version": 8, "name": "Test", "layers": []}"#;

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` every 10ms until it holds, or panic after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met within {limit:?}");
}

pub fn flight(id: &str, lat: f64, lon: f64) -> TrackerSnapshot {
    TrackerSnapshot::from_points(vec![TrackerPoint::new(id, PointKind::Flight, lat, lon)])
}

// ============================================================================
// Feed
// ============================================================================

/// Each fetch pops the next `(delay, result)`; the fallback answers once the
/// script runs out.
pub struct ScriptedSource {
    script: Mutex<VecDeque<(Duration, FeedResult<TrackerSnapshot>)>>,
    fallback: (Duration, FeedResult<TrackerSnapshot>),
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(fallback: FeedResult<TrackerSnapshot>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: (Duration::ZERO, fallback),
            calls: AtomicUsize::new(0),
        }
    }

    /// A source whose answers never arrive within a test.
    pub fn silent() -> Self {
        Self {
            fallback: (Duration::from_secs(24 * 3600), Err(FeedError::Timeout)),
            ..Self::new(Err(FeedError::Timeout))
        }
    }

    pub fn then(self, delay: Duration, result: FeedResult<TrackerSnapshot>) -> Self {
        self.script.lock().push_back((delay, result));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ScriptedSource {
    fn fetch(&self, _mode: FeedMode) -> BoxFuture<'_, FeedResult<TrackerSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

/// Hands out one queued channel per connect; refuses when none is queued.
#[derive(Default)]
pub struct ChannelConnector {
    pending: Mutex<VecDeque<mpsc::UnboundedReceiver<FeedResult<TrackerSnapshot>>>>,
    connects: AtomicUsize,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a channel for the next connect and return its sending side.
    pub fn accept(&self) -> mpsc::UnboundedSender<FeedResult<TrackerSnapshot>> {
        let (tx, rx) = mpsc::unbounded();
        self.pending.lock().push_back(rx);
        tx
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl PushConnector for ChannelConnector {
    fn connect(&self, _mode: FeedMode) -> BoxFuture<'_, FeedResult<SnapshotStream>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.pending.lock().pop_front();
        Box::pin(async move {
            match next {
                Some(rx) => Ok(rx.boxed()),
                None => Err(FeedError::Channel("connection refused".to_string())),
            }
        })
    }
}

// ============================================================================
// Map engine
// ============================================================================

enum Route {
    Respond(Duration, HttpResponse),
    Hang,
}

/// HTTP client with per-URL answers, optional delays and hangs. Unknown
/// URLs answer 404.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<String, Route>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, url: &str, body: &[u8]) -> Self {
        self.serve_after(url, Duration::ZERO, body)
    }

    pub fn serve_after(self, url: &str, delay: Duration, body: &[u8]) -> Self {
        self.routes.lock().insert(
            url.to_string(),
            Route::Respond(delay, HttpResponse::ok(body.to_vec())),
        );
        self
    }

    pub fn hang(self, url: &str) -> Self {
        self.routes.lock().insert(url.to_string(), Route::Hang);
        self
    }
}

impl AsyncHttpClient for ScriptedHttp {
    fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, HttpError>> {
        let route = match self.routes.lock().get(url) {
            Some(Route::Respond(delay, response)) => Some((*delay, response.clone())),
            Some(Route::Hang) => None,
            None => Some((
                Duration::ZERO,
                HttpResponse {
                    status: 404,
                    body: Default::default(),
                },
            )),
        };
        Box::pin(async move {
            match route {
                Some((delay, response)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(response)
                }
                None => std::future::pending().await,
            }
        })
    }
}

/// Builds the engine library inline, without a blocking thread, so paused
/// test clocks only ever wait on timers the bootstrap itself arms.
pub struct InlineLoader {
    loads: AtomicUsize,
}

impl InlineLoader {
    pub fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EngineLoader for InlineLoader {
    fn load(&self, capability: Capability) -> BoxFuture<'_, EngineResult<Arc<EngineLibrary>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { EngineLibrary::build(capability).map(Arc::new) })
    }
}

pub fn bootstrap_deps(
    http: ScriptedHttp,
    capability: StaticCapability,
    loader: Arc<InlineLoader>,
) -> BootstrapDeps {
    let capability: Arc<dyn CapabilityProbe> = Arc::new(capability);
    BootstrapDeps {
        capability,
        loader,
        primary: Arc::new(VectorRendererFactory::new(Arc::new(http))),
        fallback: Arc::new(RasterTileFactory::new(TILE_URL)),
    }
}
