//! Map engine error types.

use thiserror::Error;

/// Errors from capability detection, engine loading, renderer construction,
/// style loading and frame export.
///
/// During bootstrap these become the reason text of
/// [`EngineState::Error`](super::EngineState) and
/// [`EngineState::FallbackActive`](super::EngineState).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{0}")]
    CapabilityMissing(String),

    #[error("engine load failed: {0}")]
    EngineLoad(String),

    #[error("renderer construction failed: {0}")]
    Create(String),

    #[error("style load failed: {0}")]
    Style(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("map instance has been disposed")]
    Disposed,
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
