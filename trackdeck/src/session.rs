//! One mounted map view: feed, engine bootstrap and render sync wired
//! together.
//!
//! # Lifecycle
//!
//! 1. [`TrackerSession::start`] starts stream acquisition and the map
//!    bootstrap side by side.
//! 2. A render task re-projects the active snapshot whenever a new snapshot
//!    is published, the active renderer changes, or a fit is requested.
//! 3. Diagnostics run on demand in the background and only feed the status
//!    report.
//! 4. [`TrackerSession::shutdown`] stops the render task, the feed and the
//!    bootstrap, once.
//!
//! # Example
//!
//! ```ignore
//! let config = SessionConfig::from(&ConfigFile::load()?);
//! let deps = SessionDeps::production(&config, resolve_default_credential())?;
//! let session = TrackerSession::start(config, deps);
//!
//! session.request_fit();
//! println!("{}", session.status_report());
//!
//! session.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::credential::Credential;
use crate::diagnostics::{DiagnosticEntry, DiagnosticsProbe};
use crate::engine::{
    BootstrapDeps, EngineResult, EngineState, MapBootstrap, MapConfig, RendererHandle, Surface,
};
use crate::feed::{
    FeedConfig, FeedError, FeedStatus, HttpSnapshotSource, PushConnector, SnapshotSource,
    StreamAcquisition, WebSocketConnector,
};
use crate::http::{AsyncHttpClient, HttpError, ReqwestClient};
use crate::model::PublishedSnapshot;
use crate::render_sync::{RenderOutcome, RenderSync};
use crate::status::{compose, StatusInputs, StatusReport};

/// Errors building a session's production collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Feed setup failed: {0}")]
    Feed(#[from] FeedError),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] HttpError),
}

/// Settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub feed: FeedConfig,
    pub map: MapConfig,
    pub probe_timeout: Duration,
    /// Open the push channel in addition to polling.
    pub push_enabled: bool,
}

impl From<&ConfigFile> for SessionConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            feed: FeedConfig::from(config),
            map: MapConfig::from(config),
            probe_timeout: Duration::from_secs(config.diagnostics.probe_timeout),
            push_enabled: true,
        }
    }
}

impl SessionConfig {
    pub fn with_push(mut self, enabled: bool) -> Self {
        self.push_enabled = enabled;
        self
    }
}

/// Collaborators of a session.
pub struct SessionDeps {
    pub source: Arc<dyn SnapshotSource>,
    pub connector: Option<Arc<dyn PushConnector>>,
    pub bootstrap: BootstrapDeps,
    pub http: Arc<dyn AsyncHttpClient>,
}

impl SessionDeps {
    /// HTTP polling, a WebSocket push channel (when enabled) and the
    /// production engine stack. The credential, if any, is attached to both
    /// feed paths.
    pub fn production(
        config: &SessionConfig,
        credential: Option<Credential>,
    ) -> Result<Self, SessionError> {
        let http: Arc<dyn AsyncHttpClient> =
            Arc::new(ReqwestClient::with_timeout(config.feed.request_timeout)?);
        let source = Arc::new(HttpSnapshotSource::new(
            config.feed.clone(),
            credential.clone(),
        )?);
        let connector = config.push_enabled.then(|| {
            Arc::new(WebSocketConnector::new(config.feed.clone(), credential)) as Arc<dyn PushConnector>
        });

        Ok(Self {
            source,
            connector,
            bootstrap: BootstrapDeps::production(&config.map, Arc::clone(&http)),
            http,
        })
    }
}

/// A running tracking view.
pub struct TrackerSession {
    feed: StreamAcquisition,
    bootstrap: MapBootstrap,
    sync: Arc<Mutex<RenderSync>>,
    fit: Arc<Notify>,
    probe: DiagnosticsProbe,
    style_url: String,
    diagnostics: Arc<Mutex<Vec<DiagnosticEntry>>>,
    runtime: Handle,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl TrackerSession {
    /// Start every component. Must be called from within a Tokio runtime.
    pub fn start(config: SessionConfig, deps: SessionDeps) -> Self {
        let style_url = config.map.style_url.clone();
        let sync = Arc::new(Mutex::new(RenderSync::new(config.map.max_points)));
        let fit = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let feed = StreamAcquisition::start(config.feed, deps.source, deps.connector);
        let bootstrap = MapBootstrap::start(config.map, deps.bootstrap);

        let render_task = tokio::spawn(run_render_sync(
            feed.subscribe(),
            bootstrap.subscribe_renderer(),
            Arc::clone(&sync),
            Arc::clone(&fit),
            cancel.clone(),
        ));

        info!(style = %style_url, "Tracker session started");

        Self {
            feed,
            bootstrap,
            sync,
            fit,
            probe: DiagnosticsProbe::new(deps.http).with_timeout(config.probe_timeout),
            style_url,
            diagnostics: Arc::new(Mutex::new(Vec::new())),
            runtime: Handle::current(),
            cancel,
            tasks: Mutex::new(vec![render_task]),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn pause(&self) {
        self.feed.pause();
    }

    pub fn resume(&self) {
        self.feed.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.feed.is_paused()
    }

    /// Toggle pause, returning the new paused flag.
    pub fn toggle_pause(&self) -> bool {
        if self.is_paused() {
            self.resume();
            false
        } else {
            self.pause();
            true
        }
    }

    /// Fit the camera to the rendered points once.
    pub fn request_fit(&self) {
        self.sync.lock().request_fit();
        self.fit.notify_one();
    }

    pub fn resize(&self, surface: Surface) -> EngineResult<()> {
        self.bootstrap.resize(surface)
    }

    pub fn engine_state(&self) -> EngineState {
        self.bootstrap.state()
    }

    pub fn subscribe_engine(&self) -> watch::Receiver<EngineState> {
        self.bootstrap.subscribe_state()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<PublishedSnapshot>> {
        self.feed.subscribe()
    }

    pub fn renderer(&self) -> Option<RendererHandle> {
        self.bootstrap.renderer()
    }

    pub fn latest_snapshot(&self) -> Option<PublishedSnapshot> {
        self.feed.latest()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed.status()
    }

    pub fn last_render(&self) -> Option<RenderOutcome> {
        self.sync.lock().last_outcome()
    }

    pub fn fallback_entries(&self) -> u32 {
        self.bootstrap.fallback_entries()
    }

    /// Wait for the primary renderer or the fallback.
    pub async fn settled(&self) -> EngineState {
        self.bootstrap.settled().await
    }

    /// Start the diagnostics probe in the background. Results replace the
    /// previous ones when all checks finish. May be called from outside the
    /// runtime.
    pub fn run_diagnostics(&self) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        let probe = self.probe.clone();
        let style_url = self.style_url.clone();
        let results = Arc::clone(&self.diagnostics);
        let cancel = self.cancel.clone();

        let task = self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                entries = probe.run(&style_url) => {
                    *results.lock() = entries;
                }
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Probe results from the last completed run.
    pub fn diagnostics(&self) -> Vec<DiagnosticEntry> {
        self.diagnostics.lock().clone()
    }

    pub fn status_report(&self) -> StatusReport {
        let engine = self.engine_state();
        let renderer = self.renderer().map(|r| r.kind());
        let feed = self.feed_status();
        let snapshot = self.latest_snapshot();
        let render = self.last_render();
        let diagnostics = self.diagnostics();

        compose(StatusInputs {
            engine: &engine,
            renderer,
            feed: Some(&feed),
            snapshot: snapshot.as_ref(),
            render,
            diagnostics: &diagnostics,
        })
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop everything. Later calls return immediately.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down tracker session");
        self.cancel.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Session task ended abnormally");
            }
        }

        self.feed.shutdown().await;
        self.bootstrap.shutdown().await;
    }
}

impl Drop for TrackerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_render_sync(
    mut snapshots: watch::Receiver<Option<PublishedSnapshot>>,
    mut renderers: watch::Receiver<Option<RendererHandle>>,
    sync: Arc<Mutex<RenderSync>>,
    fit: Arc<Notify>,
    cancel: CancellationToken,
) {
    let mut renderer = renderers.borrow_and_update().clone();

    loop {
        let published = snapshots.borrow_and_update().clone();
        let result = sync.lock().apply(published.as_ref(), renderer.as_ref());
        debug!(?result, "Render sync pass");

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = renderers.changed() => {
                if changed.is_err() {
                    break;
                }
                renderer = renderers.borrow_and_update().clone();
                sync.lock().reset_renderer();
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            _ = fit.notified() => {}
        }
    }

    debug!("Render sync stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        DefaultEngineLoader, RasterTileFactory, RendererKind, StaticCapability,
        VectorRendererFactory,
    };
    use crate::feed::{MockPushConnector, MockSnapshotSource};
    use crate::http::tests::MockHttpClient;
    use crate::model::{PointKind, TrackerPoint, TrackerSnapshot};

    fn test_config() -> SessionConfig {
        SessionConfig {
            feed: FeedConfig::new("http://feed.test/api").with_refresh_interval(Duration::from_secs(10)),
            map: MapConfig::default().with_surface(Surface::new(400, 300)),
            probe_timeout: Duration::from_secs(1),
            push_enabled: true,
        }
    }

    fn test_deps(source: MockSnapshotSource, connector: Arc<MockPushConnector>) -> SessionDeps {
        let http: Arc<dyn AsyncHttpClient> = Arc::new(MockHttpClient::new());
        SessionDeps {
            source: Arc::new(source),
            connector: Some(connector),
            bootstrap: BootstrapDeps {
                capability: Arc::new(StaticCapability::missing("no acceleration context")),
                loader: Arc::new(DefaultEngineLoader),
                primary: Arc::new(VectorRendererFactory::new(Arc::clone(&http))),
                fallback: Arc::new(RasterTileFactory::new("https://t/{z}/{x}/{y}.png")),
            },
            http,
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_push_snapshot_reaches_fallback_renderer() {
        let connector = Arc::new(MockPushConnector::new());
        let push = connector.accept();
        let source = MockSnapshotSource::new(Ok(TrackerSnapshot::default()));
        let session = TrackerSession::start(test_config(), test_deps(source, Arc::clone(&connector)));

        let state = session.settled().await;
        assert_eq!(state.as_str(), "fallback-active");
        let renderer = session.renderer().unwrap();
        assert_eq!(renderer.kind(), RendererKind::Fallback);

        push.unbounded_send(Ok(TrackerSnapshot::from_points(vec![TrackerPoint::new(
            "a",
            PointKind::Flight,
            40.0,
            -70.0,
        )])))
        .unwrap();
        wait_for(|| renderer.feature_ids() == vec!["a".to_string()]).await;

        push.unbounded_send(Ok(TrackerSnapshot::default().with_warning("no data")))
            .unwrap();
        wait_for(|| renderer.features().is_empty()).await;
        wait_for(|| session.status_report().contains("no data")).await;

        session.shutdown().await;
        assert!(renderer.is_released());
        assert!(session.feed_status().shut_down);
    }

    #[tokio::test]
    async fn test_fit_request_moves_camera() {
        let connector = Arc::new(MockPushConnector::new());
        let points = vec![
            TrackerPoint::new("a", PointKind::Ship, 50.0, 0.0),
            TrackerPoint::new("b", PointKind::Ship, 52.0, 4.0),
        ];
        let source = MockSnapshotSource::new(Ok(TrackerSnapshot::from_points(points)));
        let session = TrackerSession::start(test_config(), test_deps(source, connector));

        session.settled().await;
        let renderer = session.renderer().unwrap();
        wait_for(|| renderer.features().len() == 2).await;
        let before = renderer.viewport();

        session.request_fit();
        wait_for(|| renderer.viewport() != before).await;
        assert!(renderer.viewport().visible_bounds().contains(51.0, 2.0));
        assert!(session.last_render().unwrap().fitted);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_diagnostics_feed_status_report() {
        let connector = Arc::new(MockPushConnector::new());
        let source = MockSnapshotSource::new(Ok(TrackerSnapshot::default()));
        let session = TrackerSession::start(test_config(), test_deps(source, connector));

        session.run_diagnostics();
        wait_for(|| !session.diagnostics().is_empty()).await;

        assert!(session.status_report().contains("style: HTTP 404"));
        session.shutdown().await;
        session.shutdown().await;
    }
}
