//! Map engine bootstrap supervisor.
//!
//! [`MapBootstrap`] drives a [`BootstrapMachine`] for one map surface. It
//! executes the machine's commands, runs the asynchronous steps (capability
//! detection, engine load, style fetch) as spawned tasks whose results come
//! back over a channel, and owns the one-shot bootstrap deadline.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────── supervisor task ──────────────────────┐
//!  resize() ────► │ controls ─┐                                                    │
//!                 │           ├─► BootstrapEvent ─► BootstrapMachine ─► Commands ──┼─► spawn probe / load / style
//!  spawned ─────► │ outcomes ─┘         ▲                                   │      │
//!  results        │ deadline (Sleep) ───┘                                   ▼      │
//!                 │                                  watch<EngineState>, watch<renderer>
//!                 └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When the deadline fires the supervisor yields once, so a style request
//! whose completion is due at the same instant gets a scheduler turn to
//! report, then applies every queued outcome before deciding. A style that
//! completed by then (queued, or already applied to the primary renderer)
//! wins the tie. Once the fallback is active, late results are discarded by
//! the machine.
//!
//! A new instance is required per mount: after [`MapBootstrap::shutdown`]
//! every operation answers [`EngineError::Disposed`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::capability::default_probe;
use super::library::SharedEngineLoader;
use super::raster::RasterTileFactory;
use super::renderer::{
    FallbackFactory, PrimaryEngine, PrimaryFactory, RendererHandle, Surface, Viewport,
};
use super::state::{BootstrapEvent, BootstrapMachine, Command, EngineState};
use super::vector::VectorRendererFactory;
use super::{
    Capability, CapabilityProbe, EngineError, EngineLibrary, EngineLoader, EngineResult, MapConfig,
};
use crate::http::AsyncHttpClient;

/// Collaborators of the bootstrap.
#[derive(Clone)]
pub struct BootstrapDeps {
    pub capability: Arc<dyn CapabilityProbe>,
    pub loader: Arc<dyn EngineLoader>,
    pub primary: Arc<dyn PrimaryFactory>,
    pub fallback: Arc<dyn FallbackFactory>,
}

impl BootstrapDeps {
    /// The build's capability probe, the process-wide engine loader, the
    /// vector renderer and the raster tile fallback.
    pub fn production(config: &MapConfig, http: Arc<dyn AsyncHttpClient>) -> Self {
        Self {
            capability: default_probe(),
            loader: SharedEngineLoader::global(),
            primary: Arc::new(VectorRendererFactory::new(http)),
            fallback: Arc::new(RasterTileFactory::new(config.fallback_tile_url.clone())),
        }
    }

    pub fn with_capability(mut self, capability: Arc<dyn CapabilityProbe>) -> Self {
        self.capability = capability;
        self
    }
}

/// Results of spawned steps.
enum Outcome {
    Capability(EngineResult<Capability>),
    Library(EngineResult<Arc<EngineLibrary>>),
    Style { attempt: u8, result: EngineResult<()> },
}

enum Control {
    Resize(Surface),
    RuntimeError(String),
}

#[derive(Debug, Default)]
struct BootstrapStats {
    history: Vec<EngineState>,
    fallback_entries: u32,
}

/// One supervised map instance.
pub struct MapBootstrap {
    state_rx: watch::Receiver<EngineState>,
    renderer_rx: watch::Receiver<Option<RendererHandle>>,
    controls: mpsc::UnboundedSender<Control>,
    stats: Arc<Mutex<BootstrapStats>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl MapBootstrap {
    /// Spawn the supervisor. Bootstrap begins as soon as the configured
    /// surface has a non-zero size.
    pub fn start(config: MapConfig, deps: BootstrapDeps) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Idle);
        let (renderer_tx, renderer_rx) = watch::channel(None);
        let (controls_tx, controls_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(BootstrapStats {
            history: vec![EngineState::Idle],
            fallback_entries: 0,
        }));
        let cancel = CancellationToken::new();

        let machine = BootstrapMachine::new(
            config.style_url.clone(),
            config.fallback_style_url.clone(),
            config.bootstrap_deadline.as_secs(),
        );

        let driver = Driver {
            surface: config.surface,
            deadline: Box::pin(tokio::time::sleep(config.bootstrap_deadline)),
            deadline_armed: false,
            config,
            deps,
            machine,
            capability: None,
            library: None,
            primary: None,
            state_tx,
            renderer_tx,
            outcome_tx,
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(driver.run(outcome_rx, controls_rx));

        Self {
            state_rx,
            renderer_rx,
            controls: controls_tx,
            stats,
            cancel,
            task: Mutex::new(Some(task)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    pub fn subscribe_renderer(&self) -> watch::Receiver<Option<RendererHandle>> {
        self.renderer_rx.clone()
    }

    /// The renderer consumers should draw into, once one is ready.
    pub fn renderer(&self) -> Option<RendererHandle> {
        self.renderer_rx.borrow().clone()
    }

    /// Every state entered so far.
    pub fn history(&self) -> Vec<EngineState> {
        self.stats.lock().history.clone()
    }

    /// How many times the fallback was activated (zero or one).
    pub fn fallback_entries(&self) -> u32 {
        self.stats.lock().fallback_entries
    }

    fn send(&self, control: Control) -> EngineResult<()> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }
        self.controls.send(control).map_err(|_| EngineError::Disposed)
    }

    /// Tell the instance the surface changed size. Never restarts bootstrap;
    /// an instance still waiting for a measured surface starts now.
    pub fn resize(&self, surface: Surface) -> EngineResult<()> {
        self.send(Control::Resize(surface))
    }

    /// Report a failure of the running primary renderer.
    pub fn report_runtime_error(&self, reason: impl Into<String>) -> EngineResult<()> {
        self.send(Control::RuntimeError(reason.into()))
    }

    /// Wait until the primary renderer is ready or the fallback is active.
    pub async fn settled(&self) -> EngineState {
        let mut rx = self.state_rx.clone();
        let settled = rx.wait_for(EngineState::is_settled).await.map(|s| s.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Release the renderer, cancel the deadline and make the instance
    /// inert. Runs once.
    pub async fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Map bootstrap task ended abnormally");
            }
        }
    }
}

impl Drop for MapBootstrap {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Driver {
    config: MapConfig,
    deps: BootstrapDeps,
    machine: BootstrapMachine,
    surface: Surface,
    capability: Option<Capability>,
    library: Option<Arc<EngineLibrary>>,
    primary: Option<Arc<dyn PrimaryEngine>>,
    state_tx: watch::Sender<EngineState>,
    renderer_tx: watch::Sender<Option<RendererHandle>>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    stats: Arc<Mutex<BootstrapStats>>,
    cancel: CancellationToken,
    deadline: Pin<Box<Sleep>>,
    deadline_armed: bool,
}

impl Driver {
    async fn run(
        mut self,
        mut outcomes: mpsc::UnboundedReceiver<Outcome>,
        mut controls: mpsc::UnboundedReceiver<Control>,
    ) {
        if self.surface.is_measured() {
            self.dispatch(BootstrapEvent::SurfaceMeasured);
        } else {
            debug!(surface = %self.surface, "Waiting for a measured surface");
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(control) = controls.recv() => self.handle_control(control),

                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome),

                _ = &mut self.deadline, if self.deadline_armed => {
                    self.deadline_armed = false;
                    self.on_deadline(&mut outcomes).await;
                }
            }
        }

        self.teardown();
    }

    fn viewport(&self) -> Viewport {
        self.config.initial_viewport(self.surface)
    }

    fn dispatch(&mut self, event: BootstrapEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let commands = self.machine.handle(event);
            self.publish_state();
            for command in commands {
                if let Some(follow_up) = self.execute(command) {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    fn publish_state(&self) {
        let state = self.machine.state().clone();
        {
            let mut stats = self.stats.lock();
            stats.history = self.machine.history().to_vec();
            stats.fallback_entries = self.machine.fallback_entries();
        }
        let previous = self.state_tx.borrow().clone();
        if previous != state {
            info!(from = %previous, to = %state, "Map engine state changed");
            self.state_tx.send_replace(state);
        }
    }

    fn spawn_outcome<F>(&self, work: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let outcomes = self.outcome_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                outcome = work => {
                    let _ = outcomes.send(outcome);
                }
            }
        });
    }

    fn execute(&mut self, command: Command) -> Option<BootstrapEvent> {
        match command {
            Command::DetectCapability => {
                let probe = Arc::clone(&self.deps.capability);
                self.spawn_outcome(async move { Outcome::Capability(probe.detect().await) });
                None
            }

            Command::LoadEngine => {
                let Some(capability) = self.capability.clone() else {
                    return Some(BootstrapEvent::EngineLoadFailed(
                        "no capability recorded".to_string(),
                    ));
                };
                let loader = Arc::clone(&self.deps.loader);
                self.spawn_outcome(async move { Outcome::Library(loader.load(capability).await) });
                None
            }

            Command::StartDeadline => {
                self.deadline
                    .as_mut()
                    .reset(Instant::now() + self.config.bootstrap_deadline);
                self.deadline_armed = true;
                debug!(
                    deadline_secs = self.config.bootstrap_deadline.as_secs_f64(),
                    "Bootstrap deadline armed"
                );
                None
            }

            Command::CancelDeadline => {
                self.deadline_armed = false;
                None
            }

            Command::CreateRenderer => {
                let Some(library) = self.library.clone() else {
                    return Some(BootstrapEvent::CreateFailed(
                        "engine library not loaded".to_string(),
                    ));
                };
                match self.deps.primary.create(library, self.viewport()) {
                    Ok(primary) => {
                        self.primary = Some(primary);
                        Some(BootstrapEvent::RendererCreated)
                    }
                    Err(e) => Some(BootstrapEvent::CreateFailed(e.to_string())),
                }
            }

            Command::RequestStyle { url, attempt } => {
                let Some(primary) = self.primary.clone() else {
                    return Some(BootstrapEvent::RuntimeError(
                        "no primary renderer".to_string(),
                    ));
                };
                info!(url = %url, attempt, "Requesting style");
                self.spawn_outcome(async move {
                    let result = primary.request_style(url).await;
                    Outcome::Style { attempt, result }
                });
                None
            }

            Command::Paint => match self.primary.as_ref().map(|p| p.paint()) {
                Some(Ok(())) => Some(BootstrapEvent::FirstPaint),
                Some(Err(e)) => Some(BootstrapEvent::RuntimeError(e.to_string())),
                None => Some(BootstrapEvent::RuntimeError(
                    "no primary renderer".to_string(),
                )),
            },

            Command::PublishPrimary => {
                if let Some(primary) = self.primary.clone() {
                    if let Some(capability) = &self.capability {
                        info!(adapter = %capability, "Primary renderer ready");
                    }
                    self.renderer_tx.send_replace(Some(primary.into_renderer()));
                }
                None
            }

            Command::ActivateFallback { reason } => {
                warn!(reason = %reason, "Activating fallback renderer");
                if let Some(primary) = self.primary.take() {
                    primary.release();
                }
                self.renderer_tx.send_replace(None);

                match self.deps.fallback.create(self.viewport()) {
                    Ok(renderer) => {
                        self.renderer_tx.send_replace(Some(renderer));
                    }
                    Err(e) => error!(error = %e, "Fallback renderer could not be built"),
                }
                Some(BootstrapEvent::FallbackReady)
            }
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        let event = match outcome {
            Outcome::Capability(Ok(capability)) => {
                let adapter = capability.to_string();
                self.capability = Some(capability);
                BootstrapEvent::CapabilityAvailable { adapter }
            }
            Outcome::Capability(Err(e)) => BootstrapEvent::CapabilityMissing(e.to_string()),
            Outcome::Library(Ok(library)) => {
                self.library = Some(library);
                BootstrapEvent::EngineLoaded
            }
            Outcome::Library(Err(e)) => BootstrapEvent::EngineLoadFailed(e.to_string()),
            Outcome::Style {
                attempt,
                result: Ok(()),
            } => BootstrapEvent::StyleLoaded { attempt },
            Outcome::Style {
                attempt,
                result: Err(e),
            } => {
                let reason = match e {
                    EngineError::Style(reason) => reason,
                    other => other.to_string(),
                };
                warn!(attempt, reason = %reason, "Style load failed");
                BootstrapEvent::StyleFailed { attempt, reason }
            }
        };
        self.dispatch(event);
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::Resize(surface) => {
                self.surface = surface;
                if *self.machine.state() == EngineState::Idle {
                    if surface.is_measured() {
                        self.dispatch(BootstrapEvent::SurfaceMeasured);
                    }
                    return;
                }
                let published = self.renderer_tx.borrow().clone();
                match (published, &self.primary) {
                    (Some(renderer), _) => renderer.resize(surface),
                    (None, Some(primary)) => primary.resize(surface),
                    (None, None) => {}
                }
                debug!(surface = %surface, "Map surface resized");
            }
            Control::RuntimeError(reason) => {
                self.dispatch(BootstrapEvent::RuntimeError(reason));
            }
        }
    }

    async fn on_deadline(&mut self, outcomes: &mut mpsc::UnboundedReceiver<Outcome>) {
        tokio::task::yield_now().await;
        while let Ok(outcome) = outcomes.try_recv() {
            self.handle_outcome(outcome);
        }
        if !self.machine.state().awaits_style() {
            return;
        }

        let style_ready = self
            .primary
            .as_ref()
            .map(|p| p.style_loaded())
            .unwrap_or(false);
        if style_ready {
            info!("Style completed as the deadline fired, continuing with primary renderer");
        } else {
            warn!(
                deadline_secs = self.config.bootstrap_deadline.as_secs_f64(),
                "Bootstrap deadline elapsed"
            );
        }
        self.dispatch(BootstrapEvent::DeadlineElapsed { style_ready });
    }

    fn teardown(&mut self) {
        self.deadline_armed = false;
        if let Some(primary) = self.primary.take() {
            primary.release();
        }
        if let Some(renderer) = self.renderer_tx.send_replace(None) {
            renderer.release();
        }
        info!(state = %self.machine.state(), "Map engine torn down");
    }
}
