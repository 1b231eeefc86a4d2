//! Feed error types.

use thiserror::Error;

/// Errors produced by the push channel and the pull endpoint.
///
/// These never blank the view: they end up as text in [`super::FeedStatus`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("Invalid feed endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("timeout")]
    Timeout,

    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    #[error("Push channel error: {0}")]
    Channel(String),

    #[error("Push channel closed by server")]
    ChannelClosed,

    #[error("Feed has been shut down")]
    ShutDown,
}

impl From<serde_json::Error> for FeedError {
    fn from(error: serde_json::Error) -> Self {
        FeedError::Malformed(error.to_string())
    }
}

/// Result alias for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
