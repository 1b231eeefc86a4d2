//! Generation-guarded publication of the active snapshot.
//!
//! Both acquisition paths draw generation numbers from the same counter
//! when a request is issued or a message arrives. A result is published only
//! if its generation is higher than the last one published, so a slow
//! request resolving after a faster, later one is dropped.
//!
//! ```text
//!   poll #4 issued ──────────────────────────────┐ (slow)
//!   push msg  #5 ───► publish (last = 5)         │
//!   poll #6 issued ──► publish (last = 6)        │
//!                                   resolves ◄───┘ #4 <= 6: stale, dropped
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::model::{PublishedSnapshot, SnapshotOrigin, TrackerSnapshot};

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The snapshot is now the active one.
    Published,
    /// A newer generation was already published.
    Stale { latest: u64 },
    /// The publisher has been deactivated.
    Inactive,
}

#[derive(Debug)]
struct PublisherState {
    last_generation: u64,
    active: bool,
    stale_dropped: u64,
}

/// Holds the single "active snapshot" signal.
#[derive(Debug)]
pub struct SnapshotPublisher {
    next_generation: AtomicU64,
    state: Mutex<PublisherState>,
    sender: watch::Sender<Option<PublishedSnapshot>>,
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            next_generation: AtomicU64::new(1),
            state: Mutex::new(PublisherState {
                last_generation: 0,
                active: true,
                stale_dropped: 0,
            }),
            sender,
        }
    }

    /// Draw the next generation number.
    pub fn reserve_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish `snapshot` under `generation` if it is newer than the current one.
    pub fn publish(
        &self,
        generation: u64,
        origin: SnapshotOrigin,
        snapshot: TrackerSnapshot,
    ) -> PublishOutcome {
        let mut state = self.state.lock();
        if !state.active {
            return PublishOutcome::Inactive;
        }
        if generation <= state.last_generation {
            state.stale_dropped += 1;
            debug!(
                generation,
                latest = state.last_generation,
                origin = origin.as_str(),
                "Dropping stale snapshot"
            );
            return PublishOutcome::Stale {
                latest: state.last_generation,
            };
        }

        state.last_generation = generation;
        // Sent under the lock so watchers observe generations in order.
        self.sender
            .send_replace(Some(PublishedSnapshot::new(generation, origin, snapshot)));
        PublishOutcome::Published
    }

    /// Stop accepting snapshots. The last published one stays readable.
    pub fn deactivate(&self) {
        self.state.lock().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PublishedSnapshot>> {
        self.sender.subscribe()
    }

    pub fn latest(&self) -> Option<PublishedSnapshot> {
        self.sender.borrow().clone()
    }

    pub fn last_generation(&self) -> u64 {
        self.state.lock().last_generation
    }

    pub fn stale_dropped(&self) -> u64 {
        self.state.lock().stale_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_warning(text: &str) -> TrackerSnapshot {
        TrackerSnapshot::default().with_warning(text)
    }

    #[test]
    fn test_generations_are_monotonic() {
        let publisher = SnapshotPublisher::new();
        let a = publisher.reserve_generation();
        let b = publisher.reserve_generation();
        assert_eq!(a, 1);
        assert!(b > a);
    }

    #[test]
    fn test_out_of_order_result_is_dropped() {
        let publisher = SnapshotPublisher::new();
        let slow = publisher.reserve_generation();
        let fast = publisher.reserve_generation();

        assert_eq!(
            publisher.publish(fast, SnapshotOrigin::Poll, snapshot_with_warning("fast")),
            PublishOutcome::Published
        );
        assert_eq!(
            publisher.publish(slow, SnapshotOrigin::Poll, snapshot_with_warning("slow")),
            PublishOutcome::Stale { latest: fast }
        );

        let latest = publisher.latest().unwrap();
        assert_eq!(latest.generation, fast);
        assert_eq!(latest.snapshot.warnings, vec!["fast".to_string()]);
        assert_eq!(publisher.stale_dropped(), 1);
    }

    #[test]
    fn test_deactivated_publisher_refuses() {
        let publisher = SnapshotPublisher::new();
        let gen = publisher.reserve_generation();
        publisher.deactivate();
        assert_eq!(
            publisher.publish(gen, SnapshotOrigin::Push, TrackerSnapshot::default()),
            PublishOutcome::Inactive
        );
        assert!(publisher.latest().is_none());
    }

    #[test]
    fn test_subscribers_see_latest() {
        let publisher = SnapshotPublisher::new();
        let mut rx = publisher.subscribe();
        let gen = publisher.reserve_generation();
        publisher.publish(gen, SnapshotOrigin::Push, TrackerSnapshot::default());
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.origin, SnapshotOrigin::Push);
    }
}
