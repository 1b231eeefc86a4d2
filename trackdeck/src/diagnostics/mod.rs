//! Map resource reachability checks.
//!
//! Purely informational: results only ever reach the status surface and
//! never gate the bootstrap or rendering.

mod probe;
mod template;

use std::fmt;

pub use probe::{DiagnosticsProbe, ProbeError, DEFAULT_PROBE_TIMEOUT, GLYPH_RANGE, SAMPLE_TILE};
pub use template::{expand_glyph_url, expand_tile_url};

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    /// Short failure reason: an HTTP status, `timeout`, or network error text.
    Failed(String),
}

impl ProbeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeStatus::Ok)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Ok => f.write_str("ok"),
            ProbeStatus::Failed(reason) => f.write_str(reason),
        }
    }
}

/// One labelled check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    pub label: String,
    pub status: ProbeStatus,
}

impl DiagnosticEntry {
    pub fn ok(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: ProbeStatus::Ok,
        }
    }

    pub fn failed(label: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            label: label.into(),
            status: ProbeStatus::Failed(reason.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.status)
    }
}
