//! Core data types shared by every component.
//!
//! - [`TrackerPoint`]: one tracked entity (flight or ship)
//! - [`TrackerSnapshot`]: a complete, immutable set of points plus metadata
//! - [`PublishedSnapshot`]: a snapshot stamped with its generation and origin
//! - [`GeoBounds`]: bounding boxes for viewport fitting

mod bounds;
mod point;
mod snapshot;

pub use bounds::GeoBounds;
pub use point::{PointKind, TrackerPoint};
pub use snapshot::{FeedMode, PublishedSnapshot, SnapshotOrigin, TrackerSnapshot};
