//! Snapshots: the unit exchanged between the feed and its consumers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::point::{PointKind, TrackerPoint};

/// Which entities the feed should deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Flights and ships.
    #[default]
    Combined,
    /// Flights only.
    Flights,
    /// Ships only.
    Ships,
}

impl FeedMode {
    /// Value used for the `mode` query parameter.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            FeedMode::Combined => "combined",
            FeedMode::Flights => "flights",
            FeedMode::Ships => "ships",
        }
    }

    /// Whether a point of the given kind belongs to this mode.
    pub fn includes(&self, kind: PointKind) -> bool {
        match self {
            FeedMode::Combined => true,
            FeedMode::Flights => kind == PointKind::Flight,
            FeedMode::Ships => kind == PointKind::Ship,
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_value())
    }
}

impl FromStr for FeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combined" | "all" => Ok(FeedMode::Combined),
            "flights" | "flight" | "flights-only" => Ok(FeedMode::Flights),
            "ships" | "ship" | "ships-only" => Ok(FeedMode::Ships),
            other => Err(format!(
                "unknown feed mode '{}' (expected combined, flights or ships)",
                other
            )),
        }
    }
}

/// One complete set of currently known points plus metadata.
///
/// Snapshots are immutable once published and are superseded wholesale by
/// the next one; there is no incremental patching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// Advisory total. May exceed `points.len()` when the source truncates.
    #[serde(default)]
    pub count: u64,

    /// Human-readable advisories, in the order the source reported them.
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Points in source order.
    #[serde(default)]
    pub points: Vec<TrackerPoint>,
}

impl TrackerSnapshot {
    /// Create a snapshot from points, with `count` matching the point list.
    pub fn from_points(points: Vec<TrackerPoint>) -> Self {
        Self {
            count: points.len() as u64,
            warnings: Vec::new(),
            points,
        }
    }

    /// Parse a snapshot from a JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Add a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Whether the snapshot carries no points at all.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points that have a finite position, in snapshot order.
    pub fn renderable_points(&self) -> impl Iterator<Item = &TrackerPoint> {
        self.points.iter().filter(|p| p.has_valid_position())
    }

    /// Number of points without a usable position.
    pub fn invalid_position_count(&self) -> usize {
        self.points.iter().filter(|p| !p.has_valid_position()).count()
    }

    /// Whether the source reported more entities than it delivered.
    pub fn is_truncated(&self) -> bool {
        self.count > self.points.len() as u64
    }

    /// Count of points per kind, `(flights, ships)`.
    pub fn kind_counts(&self) -> (usize, usize) {
        self.points
            .iter()
            .fold((0, 0), |(flights, ships), p| match p.kind {
                PointKind::Flight => (flights + 1, ships),
                PointKind::Ship => (flights, ships + 1),
            })
    }
}

/// Which acquisition path produced a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Delivered over the push channel.
    Push,
    /// Returned by a scheduled poll.
    Poll,
}

impl SnapshotOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotOrigin::Push => "live",
            SnapshotOrigin::Poll => "poll",
        }
    }
}

/// A snapshot as published by stream acquisition.
///
/// The generation is drawn from a monotonic counter when the request was
/// issued (poll) or the message arrived (push); consumers use it to reject
/// stale snapshots.
#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    /// Monotonic generation number, starting at 1.
    pub generation: u64,
    /// Path that produced this snapshot.
    pub origin: SnapshotOrigin,
    /// When the snapshot was published.
    pub received_at: DateTime<Utc>,
    /// The immutable snapshot.
    pub snapshot: Arc<TrackerSnapshot>,
}

impl PublishedSnapshot {
    pub fn new(generation: u64, origin: SnapshotOrigin, snapshot: TrackerSnapshot) -> Self {
        Self {
            generation,
            origin,
            received_at: Utc::now(),
            snapshot: Arc::new(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot_document() {
        let json = br#"{
            "count": 3,
            "warnings": ["partial coverage"],
            "points": [
                {"id": "a", "kind": "flight", "lat": 40, "lon": -70},
                {"id": "b", "kind": "ship", "lat": null, "lon": null}
            ]
        }"#;
        let snapshot = TrackerSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.warnings, vec!["partial coverage".to_string()]);
        assert_eq!(snapshot.points.len(), 2);
        assert_eq!(snapshot.renderable_points().count(), 1);
        assert_eq!(snapshot.invalid_position_count(), 1);
        assert!(snapshot.is_truncated());
        assert_eq!(snapshot.kind_counts(), (1, 1));
    }

    #[test]
    fn test_parse_empty_document_uses_defaults() {
        let snapshot = TrackerSnapshot::from_json(b"{}").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(TrackerSnapshot::from_json(b"{\"points\": 5}").is_err());
        assert!(TrackerSnapshot::from_json(b"not json").is_err());
    }

    #[test]
    fn test_point_order_is_preserved() {
        let points = vec![
            TrackerPoint::new("z", PointKind::Flight, 1.0, 1.0),
            TrackerPoint::new("a", PointKind::Flight, 2.0, 2.0),
            TrackerPoint::new("m", PointKind::Ship, 3.0, 3.0),
        ];
        let snapshot = TrackerSnapshot::from_points(points);
        let ids: Vec<_> = snapshot.renderable_points().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_feed_mode_parse_and_display() {
        assert_eq!("flights".parse::<FeedMode>().unwrap(), FeedMode::Flights);
        assert_eq!("Ships-Only".parse::<FeedMode>().unwrap(), FeedMode::Ships);
        assert_eq!(FeedMode::Combined.to_string(), "combined");
        assert!("boats".parse::<FeedMode>().is_err());
    }

    #[test]
    fn test_feed_mode_includes() {
        assert!(FeedMode::Combined.includes(PointKind::Ship));
        assert!(FeedMode::Flights.includes(PointKind::Flight));
        assert!(!FeedMode::Flights.includes(PointKind::Ship));
    }
}
