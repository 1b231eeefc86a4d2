//! Integration tests for the map engine bootstrap and its fallback.
//!
//! These tests drive a full [`MapBootstrap`] through scripted HTTP and
//! capability answers with a paused clock:
//! - capability absence goes straight to the fallback
//! - the deadline forces the fallback exactly once
//! - a style finishing as the deadline fires still reaches Ready
//! - a style arriving after the fallback is discarded
//! - teardown silences in-flight work and the deadline
//!
//! Run with: `cargo test --test bootstrap_fallback`

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use trackdeck::engine::{
    EngineLibrary, EngineResult, EngineState, MapBootstrap, MapConfig, MapRenderer,
    MarkerFeature, PrimaryEngine, PrimaryFactory, RendererHandle, RendererKind,
    StaticCapability, Surface, VectorRendererFactory, Viewport,
};
use trackdeck::model::GeoBounds;
use trackdeck::BoxFuture;

use common::{
    bootstrap_deps, settle, InlineLoader, ScriptedHttp, PRIMARY_STYLE, SECONDARY_STYLE,
    STYLE_BODY,
};

const DEADLINE: Duration = Duration::from_secs(8);

fn config() -> MapConfig {
    MapConfig::default()
        .with_styles(PRIMARY_STYLE, SECONDARY_STYLE)
        .with_surface(Surface::new(400, 300))
        .with_deadline(DEADLINE)
}

fn deadline_reason() -> String {
    format!(
        "map engine did not become ready within {}s",
        DEADLINE.as_secs()
    )
}

fn count_fallback(history: &[EngineState]) -> usize {
    history
        .iter()
        .filter(|s| matches!(s, EngineState::FallbackActive { .. }))
        .count()
}

// ============================================================================
// Capability
// ============================================================================

/// No acceleration context: Idle → CapabilityCheck → Error → FallbackActive,
/// without the clock moving and without ever loading the engine.
#[tokio::test(start_paused = true)]
async fn test_missing_capability_falls_back_without_loading_engine() {
    let loader = Arc::new(InlineLoader::new());
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            ScriptedHttp::new(),
            StaticCapability::missing("no acceleration context"),
            Arc::clone(&loader),
        ),
    );

    let started = Instant::now();
    let state = bootstrap.settled().await;
    assert!(
        started.elapsed() < Duration::from_millis(1),
        "fallback must not wait on a timer"
    );

    let reason = "no acceleration context".to_string();
    assert_eq!(state, EngineState::FallbackActive { reason: reason.clone() });
    assert_eq!(
        bootstrap.history(),
        vec![
            EngineState::Idle,
            EngineState::CapabilityCheck,
            EngineState::Error {
                reason: reason.clone()
            },
            EngineState::FallbackActive { reason },
        ]
    );
    assert_eq!(loader.load_count(), 0);
    assert_eq!(
        bootstrap.renderer().map(|r| r.kind()),
        Some(RendererKind::Fallback)
    );
    bootstrap.shutdown().await;
}

// ============================================================================
// Deadline
// ============================================================================

/// A style request that never resolves trips the deadline; the fallback is
/// entered once and the primary path is never retried.
#[tokio::test(start_paused = true)]
async fn test_deadline_forces_fallback_exactly_once() {
    let loader = Arc::new(InlineLoader::new());
    let http = ScriptedHttp::new().hang(PRIMARY_STYLE);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(http, StaticCapability::available("test adapter"), Arc::clone(&loader)),
    );

    let started = Instant::now();
    let state = bootstrap.settled().await;
    assert!(Instant::now() - started >= DEADLINE);
    assert_eq!(
        state,
        EngineState::FallbackActive {
            reason: deadline_reason()
        }
    );

    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;

    let history = bootstrap.history();
    assert_eq!(count_fallback(&history), 1);
    assert_eq!(bootstrap.fallback_entries(), 1);
    assert_eq!(loader.load_count(), 1);
    let error_at = history
        .iter()
        .position(|s| matches!(s, EngineState::Error { .. }))
        .unwrap();
    assert_eq!(history.len(), error_at + 2, "nothing may follow the fallback");
    assert_eq!(
        bootstrap.renderer().map(|r| r.kind()),
        Some(RendererKind::Fallback)
    );
    bootstrap.shutdown().await;
}

/// Timeouts count as failures on the retry as well.
#[tokio::test(start_paused = true)]
async fn test_deadline_covers_retry_attempt() {
    let http = ScriptedHttp::new().hang(SECONDARY_STYLE);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            http,
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );

    let state = bootstrap.settled().await;

    assert_eq!(
        state,
        EngineState::FallbackActive {
            reason: deadline_reason()
        }
    );
    assert!(bootstrap
        .history()
        .contains(&EngineState::StyleRequesting { attempt: 2 }));
    bootstrap.shutdown().await;
}

/// Both styles failing outright ends in the fallback before the deadline.
#[tokio::test(start_paused = true)]
async fn test_both_styles_failing_falls_back_early() {
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            ScriptedHttp::new(),
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );

    let started = Instant::now();
    let state = bootstrap.settled().await;

    assert!(Instant::now() - started < DEADLINE);
    assert_eq!(
        state,
        EngineState::FallbackActive {
            reason: "style unavailable: HTTP 404".to_string()
        }
    );
    bootstrap.shutdown().await;
}

// ============================================================================
// Late success
// ============================================================================

/// A style that arrives after the fallback took over is discarded: the
/// instance stays on the fallback renderer and never reports Ready.
#[tokio::test(start_paused = true)]
async fn test_late_style_after_fallback_is_discarded() {
    let http = ScriptedHttp::new().serve_after(PRIMARY_STYLE, Duration::from_secs(10), STYLE_BODY);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            http,
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );

    assert!(matches!(
        bootstrap.settled().await,
        EngineState::FallbackActive { .. }
    ));
    let fallback = bootstrap.renderer().unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;

    assert!(matches!(bootstrap.state(), EngineState::FallbackActive { .. }));
    assert!(!bootstrap.history().contains(&EngineState::Ready));
    assert_eq!(bootstrap.fallback_entries(), 1);
    let current = bootstrap.renderer().unwrap();
    assert!(Arc::ptr_eq(&fallback, &current));
    assert!(!current.is_released());
    bootstrap.shutdown().await;
}

/// A style response due at the same instant as the deadline wins the tie.
#[tokio::test(start_paused = true)]
async fn test_style_completing_at_deadline_reaches_ready() {
    let http = ScriptedHttp::new().serve_after(PRIMARY_STYLE, DEADLINE, STYLE_BODY);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            http,
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );

    assert_eq!(bootstrap.settled().await, EngineState::Ready);
    assert_eq!(bootstrap.fallback_entries(), 0);
    assert!(!bootstrap
        .history()
        .iter()
        .any(|s| matches!(s, EngineState::Error { .. })));
    assert_eq!(
        bootstrap.renderer().map(|r| r.kind()),
        Some(RendererKind::Primary)
    );
    bootstrap.shutdown().await;
}

/// Primary renderer that applies its style but never reports completion, so
/// the deadline finds the style loaded with no outcome queued.
struct UnreportedStyle {
    inner: Arc<dyn PrimaryEngine>,
}

impl MapRenderer for UnreportedStyle {
    fn kind(&self) -> RendererKind {
        self.inner.kind()
    }

    fn set_features(&self, features: Vec<MarkerFeature>) {
        self.inner.set_features(features)
    }

    fn features(&self) -> Vec<MarkerFeature> {
        self.inner.features()
    }

    fn fit_bounds(&self, bounds: GeoBounds) {
        self.inner.fit_bounds(bounds)
    }

    fn resize(&self, surface: Surface) {
        self.inner.resize(surface)
    }

    fn viewport(&self) -> Viewport {
        self.inner.viewport()
    }

    fn export_png(&self) -> BoxFuture<'_, EngineResult<Vec<u8>>> {
        self.inner.export_png()
    }

    fn release(&self) {
        self.inner.release()
    }

    fn is_released(&self) -> bool {
        self.inner.is_released()
    }
}

impl PrimaryEngine for UnreportedStyle {
    fn request_style(&self, url: String) -> BoxFuture<'_, EngineResult<()>> {
        Box::pin(async move {
            self.inner.request_style(url).await?;
            std::future::pending::<EngineResult<()>>().await
        })
    }

    fn style_loaded(&self) -> bool {
        self.inner.style_loaded()
    }

    fn paint(&self) -> EngineResult<()> {
        self.inner.paint()
    }

    fn into_renderer(self: Arc<Self>) -> RendererHandle {
        self
    }
}

struct UnreportedStyleFactory(VectorRendererFactory);

impl PrimaryFactory for UnreportedStyleFactory {
    fn create(
        &self,
        library: Arc<EngineLibrary>,
        viewport: Viewport,
    ) -> EngineResult<Arc<dyn PrimaryEngine>> {
        let inner = self.0.create(library, viewport)?;
        Ok(Arc::new(UnreportedStyle { inner }))
    }
}

/// A style already applied to the renderer when the deadline fires counts
/// as loaded even though its completion was never delivered.
#[tokio::test(start_paused = true)]
async fn test_style_applied_before_deadline_is_promoted() {
    let http = Arc::new(ScriptedHttp::new().serve(PRIMARY_STYLE, STYLE_BODY));
    let mut deps = bootstrap_deps(
        ScriptedHttp::new(),
        StaticCapability::available("test adapter"),
        Arc::new(InlineLoader::new()),
    );
    deps.primary = Arc::new(UnreportedStyleFactory(VectorRendererFactory::new(http)));
    let bootstrap = MapBootstrap::start(config(), deps);

    settle().await;
    assert_eq!(
        bootstrap.state(),
        EngineState::StyleRequesting { attempt: 1 }
    );

    let started = Instant::now();
    assert_eq!(bootstrap.settled().await, EngineState::Ready);
    assert!(Instant::now() - started >= DEADLINE);
    assert_eq!(bootstrap.fallback_entries(), 0);
    assert!(bootstrap.history().contains(&EngineState::StyleLoaded));
    assert_eq!(
        bootstrap.renderer().map(|r| r.kind()),
        Some(RendererKind::Primary)
    );
    bootstrap.shutdown().await;
}

/// A style that lands well inside the deadline reaches Ready and the
/// deadline never fires afterwards.
#[tokio::test(start_paused = true)]
async fn test_style_within_deadline_reaches_ready() {
    let http = ScriptedHttp::new().serve_after(PRIMARY_STYLE, Duration::from_secs(3), STYLE_BODY);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            http,
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );

    assert_eq!(bootstrap.settled().await, EngineState::Ready);

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(bootstrap.state(), EngineState::Ready);
    assert_eq!(bootstrap.fallback_entries(), 0);
    bootstrap.shutdown().await;
}

// ============================================================================
// Runtime errors, resize and teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_runtime_error_after_ready_switches_to_fallback() {
    let http = ScriptedHttp::new().serve(PRIMARY_STYLE, STYLE_BODY);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            http,
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );
    assert_eq!(bootstrap.settled().await, EngineState::Ready);
    let primary = bootstrap.renderer().unwrap();
    let mut renderers = bootstrap.subscribe_renderer();
    renderers.borrow_and_update();

    bootstrap.report_runtime_error("context lost").unwrap();
    renderers.changed().await.unwrap();
    settle().await;

    assert_eq!(
        bootstrap.state(),
        EngineState::FallbackActive {
            reason: "context lost".to_string()
        }
    );
    assert!(primary.is_released());
    assert_eq!(
        bootstrap.renderer().map(|r| r.kind()),
        Some(RendererKind::Fallback)
    );
    bootstrap.shutdown().await;
}

/// Resizing the fallback updates its viewport without another cycle.
#[tokio::test(start_paused = true)]
async fn test_resize_after_fallback_keeps_state() {
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            ScriptedHttp::new(),
            StaticCapability::missing("no adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );
    bootstrap.settled().await;
    let before = bootstrap.history().len();

    bootstrap.resize(Surface::new(1280, 720)).unwrap();
    settle().await;

    let viewport = bootstrap.renderer().unwrap().viewport();
    assert_eq!((viewport.width, viewport.height), (1280, 720));
    assert_eq!(bootstrap.history().len(), before);
    bootstrap.shutdown().await;
}

/// Teardown while the style is in flight: the deadline never fires and no
/// fallback is created for the disposed instance.
#[tokio::test(start_paused = true)]
async fn test_teardown_silences_deadline_and_pending_style() {
    let http = ScriptedHttp::new().serve_after(PRIMARY_STYLE, Duration::from_secs(4), STYLE_BODY);
    let bootstrap = MapBootstrap::start(
        config(),
        bootstrap_deps(
            http,
            StaticCapability::available("test adapter"),
            Arc::new(InlineLoader::new()),
        ),
    );
    settle().await;
    assert_eq!(
        bootstrap.state(),
        EngineState::StyleRequesting { attempt: 1 }
    );

    bootstrap.shutdown().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;

    assert!(bootstrap.is_disposed());
    assert_eq!(
        bootstrap.state(),
        EngineState::StyleRequesting { attempt: 1 }
    );
    assert_eq!(bootstrap.fallback_entries(), 0);
    assert!(bootstrap.renderer().is_none());
}
