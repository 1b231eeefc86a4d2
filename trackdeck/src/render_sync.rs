//! Projects the active snapshot onto the active renderer.
//!
//! Each apply replaces the renderer's whole marker set. Points without a
//! finite position are dropped before anything else, then the remainder is
//! capped to the point budget in snapshot order. The camera only moves when
//! a fit was requested.

use tracing::{debug, trace};

use crate::engine::{MarkerFeature, RendererHandle};
use crate::model::{GeoBounds, PublishedSnapshot, TrackerSnapshot};

/// Default point budget.
pub const DEFAULT_MAX_POINTS: usize = 200;

/// What one apply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOutcome {
    /// Generation of the snapshot that was rendered.
    pub generation: u64,
    /// Markers handed to the renderer.
    pub rendered: usize,
    /// Points skipped for a missing or non-finite position.
    pub filtered_invalid: usize,
    /// Valid points dropped by the point budget.
    pub truncated: usize,
    /// Whether the camera was fitted to the rendered markers.
    pub fitted: bool,
}

/// Result of [`RenderSync::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResult {
    Rendered(RenderOutcome),
    /// The snapshot was already rendered and no fit is pending.
    Unchanged,
    /// The snapshot is older than the one already rendered.
    Stale { generation: u64, last_applied: u64 },
    /// No renderer is ready yet.
    NoRenderer,
    /// Nothing has been published yet.
    NoSnapshot,
}

/// Markers for a snapshot, plus how many points were filtered and
/// truncated.
pub fn build_features(
    snapshot: &TrackerSnapshot,
    max_points: usize,
) -> (Vec<MarkerFeature>, usize, usize) {
    let mut features = Vec::with_capacity(snapshot.points.len().min(max_points));
    let mut invalid = 0;
    let mut truncated = 0;

    for point in &snapshot.points {
        let Some((lat, lon)) = point.coordinates() else {
            invalid += 1;
            continue;
        };
        if features.len() >= max_points {
            truncated += 1;
            continue;
        }
        features.push(
            MarkerFeature::new(point.id.clone(), point.kind, lat, lon)
                .with_label(point.display_label()),
        );
    }

    (features, invalid, truncated)
}

/// Keeps one renderer in step with the published snapshots.
#[derive(Debug)]
pub struct RenderSync {
    max_points: usize,
    last_generation: Option<u64>,
    fit_requested: bool,
    last_outcome: Option<RenderOutcome>,
}

impl Default for RenderSync {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

impl RenderSync {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points,
            last_generation: None,
            fit_requested: false,
            last_outcome: None,
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Fit the camera on the next apply that renders at least one marker.
    pub fn request_fit(&mut self) {
        self.fit_requested = true;
    }

    pub fn fit_pending(&self) -> bool {
        self.fit_requested
    }

    /// Forget what was rendered so the current snapshot is projected again,
    /// e.g. after the renderer was swapped for the fallback.
    pub fn reset_renderer(&mut self) {
        self.last_generation = None;
    }

    pub fn last_outcome(&self) -> Option<RenderOutcome> {
        self.last_outcome
    }

    pub fn apply(
        &mut self,
        published: Option<&PublishedSnapshot>,
        renderer: Option<&RendererHandle>,
    ) -> SyncResult {
        let Some(renderer) = renderer.filter(|r| !r.is_released()) else {
            return SyncResult::NoRenderer;
        };
        let Some(published) = published else {
            return SyncResult::NoSnapshot;
        };

        let generation = published.generation;
        match self.last_generation {
            Some(last) if generation < last => {
                debug!(generation, last_applied = last, "Skipping stale snapshot");
                return SyncResult::Stale {
                    generation,
                    last_applied: last,
                };
            }
            Some(last) if generation == last && !self.fit_requested => {
                return SyncResult::Unchanged;
            }
            _ => {}
        }

        let (features, filtered_invalid, truncated) =
            build_features(&published.snapshot, self.max_points);

        let bounds = if self.fit_requested {
            GeoBounds::from_positions(features.iter().map(|f| (f.lat, f.lon)))
        } else {
            None
        };

        let rendered = features.len();
        renderer.set_features(features);

        let fitted = match bounds {
            Some(bounds) => {
                renderer.fit_bounds(bounds);
                self.fit_requested = false;
                true
            }
            None => false,
        };

        let outcome = RenderOutcome {
            generation,
            rendered,
            filtered_invalid,
            truncated,
            fitted,
        };
        trace!(
            generation,
            rendered,
            filtered_invalid,
            truncated,
            fitted,
            renderer = renderer.kind().as_str(),
            "Snapshot rendered"
        );

        self.last_generation = Some(generation);
        self.last_outcome = Some(outcome);
        SyncResult::Rendered(outcome)
    }
}
