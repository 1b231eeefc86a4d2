//! Stream acquisition for the point feed.
//!
//! A live push channel ([`PushConnector`]) and a scheduled pull
//! ([`SnapshotSource`]) feed a single generation-guarded
//! [`SnapshotPublisher`]. [`StreamAcquisition`] owns both paths, the pause
//! control and teardown.

mod acquisition;
mod channel;
mod config;
mod error;
mod publisher;
mod source;

pub use acquisition::{FeedStatus, StreamAcquisition};
pub use channel::{PushConnector, SnapshotStream, WebSocketConnector};
pub use config::{FeedConfig, MIN_REFRESH_INTERVAL};
pub use error::{FeedError, FeedResult};
pub use publisher::{PublishOutcome, SnapshotPublisher};
pub use source::{HttpSnapshotSource, SnapshotSource};

#[cfg(test)]
pub(crate) use channel::tests::MockPushConnector;
#[cfg(test)]
pub(crate) use source::tests::MockSnapshotSource;
