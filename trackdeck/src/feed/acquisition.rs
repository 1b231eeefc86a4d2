//! Stream acquisition: one push channel plus one polling timer, merged into a
//! single active snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     StreamAcquisition                         │
//! │                                                               │
//! │  push task ── connect ──► message ──► reserve gen ──┐         │
//! │     ▲  (reopens only after pause/resume)            │         │
//! │     │                                               ▼         │
//! │  control (paused, epoch)                   SnapshotPublisher  │
//! │     │                                      (gen > last only)  │
//! │     ▼                                               ▲         │
//! │  poll task ── interval tick ──► reserve gen ──► fetch ──┘     │
//! │     (one timer for the lifetime of the instance)              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both paths run side by side: whichever result carries the higher
//! generation is what consumers observe. A broken push channel marks the
//! feed disconnected and is not retried automatically; polling keeps going.
//!
//! # Example
//!
//! ```ignore
//! let acquisition = StreamAcquisition::start(config, source, Some(connector));
//! let mut snapshots = acquisition.subscribe();
//! snapshots.changed().await?;
//! acquisition.pause();
//! acquisition.resume();
//! acquisition.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    FeedConfig, FeedResult, PublishOutcome, PushConnector, SnapshotPublisher, SnapshotSource,
    MIN_REFRESH_INTERVAL,
};
use crate::model::{FeedMode, PublishedSnapshot, SnapshotOrigin, TrackerSnapshot};

/// Pause state shared with both tasks.
///
/// `epoch` increases on every resume; the push task uses it to decide
/// whether a new connection attempt is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Control {
    paused: bool,
    epoch: u64,
}

/// Point-in-time view of the acquisition for the status surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedStatus {
    pub mode: FeedMode,
    pub refresh_interval: Duration,
    /// Whether a push path was configured at all.
    pub push_enabled: bool,
    pub connected: bool,
    pub paused: bool,
    /// Why the push channel is down, if it went down abnormally.
    pub channel_error: Option<String>,
    /// Error of the most recent poll, cleared by the next successful one.
    pub poll_error: Option<String>,
    pub last_generation: Option<u64>,
    pub last_origin: Option<SnapshotOrigin>,
    pub last_received_at: Option<DateTime<Utc>>,
    pub stale_dropped: u64,
    pub push_messages: u64,
    pub polls_issued: u64,
    pub poll_failures: u64,
    pub channel_opens: u64,
    /// Live polling timers. At most one per instance.
    pub active_timers: usize,
    pub shut_down: bool,
}

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    channel_error: Option<String>,
    poll_error: Option<String>,
}

struct Shared {
    publisher: SnapshotPublisher,
    link: Mutex<LinkState>,
    push_messages: AtomicU64,
    polls_issued: AtomicU64,
    poll_failures: AtomicU64,
    channel_opens: AtomicU64,
    active_timers: AtomicUsize,
}

impl Shared {
    fn set_connected(&self) {
        let mut link = self.link.lock();
        link.connected = true;
        link.channel_error = None;
    }

    fn set_disconnected(&self, reason: Option<String>) {
        let mut link = self.link.lock();
        link.connected = false;
        if reason.is_some() {
            link.channel_error = reason;
        }
    }
}

/// Decrements the live-timer count when the poll task exits.
struct TimerGuard<'a>(&'a AtomicUsize);

impl<'a> TimerGuard<'a> {
    fn register(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running acquisition instance.
///
/// Create one per mounted view with [`StreamAcquisition::start`]; release it
/// with [`StreamAcquisition::shutdown`]. Dropping it also cancels both tasks.
pub struct StreamAcquisition {
    config: FeedConfig,
    push_enabled: bool,
    shared: Arc<Shared>,
    control: watch::Sender<Control>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl StreamAcquisition {
    /// Start the push task (when a connector is given) and the poll task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: FeedConfig,
        source: Arc<dyn SnapshotSource>,
        connector: Option<Arc<dyn PushConnector>>,
    ) -> Self {
        if config.refresh_interval < MIN_REFRESH_INTERVAL {
            warn!(
                requested_ms = config.refresh_interval.as_millis() as u64,
                min_secs = MIN_REFRESH_INTERVAL.as_secs(),
                "Refresh interval too short, raising to minimum"
            );
        }
        let config = config.normalized();
        let shared = Arc::new(Shared {
            publisher: SnapshotPublisher::new(),
            link: Mutex::new(LinkState::default()),
            push_messages: AtomicU64::new(0),
            polls_issued: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            channel_opens: AtomicU64::new(0),
            active_timers: AtomicUsize::new(0),
        });
        let (control, _) = watch::channel(Control::default());
        let cancel = CancellationToken::new();

        info!(
            mode = %config.mode,
            interval_secs = config.refresh_interval.as_secs(),
            push = connector.is_some(),
            "Starting stream acquisition"
        );

        let mut tasks = Vec::with_capacity(2);
        let push_enabled = connector.is_some();

        if let Some(connector) = connector {
            tasks.push(tokio::spawn(run_push(
                Arc::clone(&shared),
                connector,
                config.mode,
                control.subscribe(),
                cancel.clone(),
            )));
        }

        tasks.push(tokio::spawn(run_poll(
            Arc::clone(&shared),
            source,
            config.mode,
            config.refresh_interval,
            control.subscribe(),
            cancel.clone(),
        )));

        Self {
            config,
            push_enabled,
            shared,
            control,
            cancel,
            tasks: Mutex::new(tasks),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Receiver for the active snapshot signal.
    pub fn subscribe(&self) -> watch::Receiver<Option<PublishedSnapshot>> {
        self.shared.publisher.subscribe()
    }

    /// The currently active snapshot.
    pub fn latest(&self) -> Option<PublishedSnapshot> {
        self.shared.publisher.latest()
    }

    /// Stop issuing polls and close the push channel. Data is kept.
    pub fn pause(&self) {
        let changed = self.control.send_if_modified(|control| {
            if control.paused {
                return false;
            }
            control.paused = true;
            true
        });
        if changed {
            info!("Feed paused");
        }
    }

    /// Re-activate both paths.
    ///
    /// The poll path fires immediately on the existing timer; the push
    /// channel is reopened if it is not connected.
    pub fn resume(&self) {
        let changed = self.control.send_if_modified(|control| {
            if !control.paused {
                return false;
            }
            control.paused = false;
            control.epoch += 1;
            true
        });
        if changed {
            info!("Feed resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.control.borrow().paused
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn status(&self) -> FeedStatus {
        let link = self.shared.link.lock();
        let latest = self.shared.publisher.latest();
        FeedStatus {
            mode: self.config.mode,
            refresh_interval: self.config.refresh_interval,
            push_enabled: self.push_enabled,
            connected: link.connected,
            paused: self.is_paused(),
            channel_error: link.channel_error.clone(),
            poll_error: link.poll_error.clone(),
            last_generation: latest.as_ref().map(|s| s.generation),
            last_origin: latest.as_ref().map(|s| s.origin),
            last_received_at: latest.as_ref().map(|s| s.received_at),
            stale_dropped: self.shared.publisher.stale_dropped(),
            push_messages: self.shared.push_messages.load(Ordering::SeqCst),
            polls_issued: self.shared.polls_issued.load(Ordering::SeqCst),
            poll_failures: self.shared.poll_failures.load(Ordering::SeqCst),
            channel_opens: self.shared.channel_opens.load(Ordering::SeqCst),
            active_timers: self.shared.active_timers.load(Ordering::SeqCst),
            shut_down: self.shut_down.load(Ordering::SeqCst),
        }
    }

    /// Release the channel and the timer. Runs once; later calls return
    /// immediately. No snapshot is published after this returns.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.shared.publisher.deactivate();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Feed task ended abnormally");
                }
            }
        }
        self.shared.set_disconnected(None);
        info!("Stream acquisition shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for StreamAcquisition {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.shared.publisher.deactivate();
    }
}

async fn run_push(
    shared: Arc<Shared>,
    connector: Arc<dyn PushConnector>,
    mode: FeedMode,
    mut control: watch::Receiver<Control>,
    cancel: CancellationToken,
) {
    let mut attempted_epoch: Option<u64> = None;

    loop {
        let epoch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            ready = control.wait_for(|c| !c.paused && attempted_epoch.map_or(true, |e| c.epoch > e)) => {
                match ready {
                    Ok(c) => c.epoch,
                    Err(_) => return,
                }
            }
        };
        attempted_epoch = Some(epoch);
        shared.channel_opens.fetch_add(1, Ordering::SeqCst);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = connector.connect(mode) => result,
        };

        let mut stream = match opened {
            Ok(stream) => {
                shared.set_connected();
                stream
            }
            Err(e) => {
                warn!(error = %e, "Push channel failed to open");
                shared.set_disconnected(Some(e.to_string()));
                continue;
            }
        };

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    shared.set_disconnected(None);
                    return;
                }

                changed = control.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if control.borrow_and_update().paused {
                        debug!("Closing push channel while paused");
                        shared.set_disconnected(None);
                        break;
                    }
                }

                message = stream.next() => match message {
                    Some(Ok(snapshot)) => {
                        let generation = shared.publisher.reserve_generation();
                        shared.push_messages.fetch_add(1, Ordering::SeqCst);
                        publish(&shared, generation, SnapshotOrigin::Push, snapshot);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Push channel disconnected");
                        shared.set_disconnected(Some(e.to_string()));
                        break;
                    }
                    None => {
                        warn!("Push channel ended");
                        shared.set_disconnected(Some("push channel closed".to_string()));
                        break;
                    }
                }
            }
        }
    }
}

async fn run_poll(
    shared: Arc<Shared>,
    source: Arc<dyn SnapshotSource>,
    mode: FeedMode,
    interval: Duration,
    mut control: watch::Receiver<Control>,
    cancel: CancellationToken,
) {
    let _timer = TimerGuard::register(&shared.active_timers);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: JoinSet<(u64, FeedResult<TrackerSnapshot>)> = JoinSet::new();
    let mut paused = control.borrow_and_update().paused;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_paused = control.borrow_and_update().paused;
                if paused && !now_paused {
                    ticker.reset_immediately();
                }
                paused = now_paused;
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok((generation, result)) => handle_poll_result(&shared, generation, result),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        shared.poll_failures.fetch_add(1, Ordering::SeqCst);
                        shared.link.lock().poll_error = Some(e.to_string());
                    }
                }
            }

            _ = ticker.tick(), if !paused => {
                let generation = shared.publisher.reserve_generation();
                shared.polls_issued.fetch_add(1, Ordering::SeqCst);
                debug!(generation, "Issuing poll");
                let source = Arc::clone(&source);
                in_flight.spawn(async move { (generation, source.fetch(mode).await) });
            }
        }
    }

    in_flight.abort_all();
}

fn handle_poll_result(shared: &Shared, generation: u64, result: FeedResult<TrackerSnapshot>) {
    match result {
        Ok(snapshot) => {
            if publish(shared, generation, SnapshotOrigin::Poll, snapshot)
                != PublishOutcome::Inactive
            {
                shared.link.lock().poll_error = None;
            }
        }
        Err(e) => {
            shared.poll_failures.fetch_add(1, Ordering::SeqCst);
            if generation <= shared.publisher.last_generation() {
                debug!(generation, error = %e, "Stale poll failed after newer data");
                return;
            }
            warn!(generation, error = %e, "Poll failed, keeping last snapshot");
            shared.link.lock().poll_error = Some(e.to_string());
        }
    }
}

fn publish(
    shared: &Shared,
    generation: u64,
    origin: SnapshotOrigin,
    snapshot: TrackerSnapshot,
) -> PublishOutcome {
    let points = snapshot.points.len();
    let outcome = shared.publisher.publish(generation, origin, snapshot);
    if outcome == PublishOutcome::Published {
        debug!(generation, origin = origin.as_str(), points, "Published snapshot");
    }
    outcome
}
