//! Human-readable status lines for the surrounding view.
//!
//! [`compose`] folds the engine state, feed status, current snapshot, last
//! render outcome and probe results into an ordered list of lines. Snapshot
//! warnings are passed through verbatim.

use std::fmt;

use crate::diagnostics::DiagnosticEntry;
use crate::engine::{EngineState, RendererKind};
use crate::feed::FeedStatus;
use crate::model::PublishedSnapshot;
use crate::render_sync::RenderOutcome;

/// Severity of a status line, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusLevel {
    Ok,
    Info,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Ok => "ok",
            StatusLevel::Info => "info",
            StatusLevel::Warning => "warn",
            StatusLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusLine {
    fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Ordered status lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub lines: Vec<StatusLine>,
}

impl StatusReport {
    fn push(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.lines.push(StatusLine::new(level, text));
    }

    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }

    /// Whether any line reads exactly `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|l| l.text == text)
    }

    /// Most severe level present, `Ok` for an empty report.
    pub fn worst(&self) -> StatusLevel {
        self.lines
            .iter()
            .map(|l| l.level)
            .max()
            .unwrap_or(StatusLevel::Ok)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "[{}] {}", line.level.as_str(), line.text)?;
        }
        Ok(())
    }
}

/// Everything the status surface reads.
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs<'a> {
    pub engine: &'a EngineState,
    pub renderer: Option<RendererKind>,
    pub feed: Option<&'a FeedStatus>,
    pub snapshot: Option<&'a PublishedSnapshot>,
    pub render: Option<RenderOutcome>,
    pub diagnostics: &'a [DiagnosticEntry],
}

impl<'a> StatusInputs<'a> {
    pub fn new(engine: &'a EngineState) -> Self {
        Self {
            engine,
            renderer: None,
            feed: None,
            snapshot: None,
            render: None,
            diagnostics: &[],
        }
    }
}

pub fn compose(inputs: StatusInputs<'_>) -> StatusReport {
    let mut report = StatusReport::default();
    engine_line(&mut report, inputs.engine, inputs.renderer);
    if let Some(feed) = inputs.feed {
        feed_lines(&mut report, feed);
    }
    if let Some(published) = inputs.snapshot {
        snapshot_lines(&mut report, published);
    }
    if let Some(outcome) = inputs.render.filter(|o| o.truncated > 0) {
        report.push(
            StatusLevel::Info,
            format!(
                "Showing {} of {} positioned points",
                outcome.rendered,
                outcome.rendered + outcome.truncated
            ),
        );
    }
    for entry in inputs.diagnostics {
        let level = if entry.is_ok() {
            StatusLevel::Ok
        } else {
            StatusLevel::Warning
        };
        report.push(level, entry.to_string());
    }
    report
}

fn engine_line(report: &mut StatusReport, state: &EngineState, renderer: Option<RendererKind>) {
    let (level, text) = match state {
        EngineState::Idle => (StatusLevel::Info, "Map: waiting for surface".to_string()),
        EngineState::CapabilityCheck => (
            StatusLevel::Info,
            "Map: checking graphics capability…".to_string(),
        ),
        EngineState::EngineLoading => (StatusLevel::Info, "Map: loading engine…".to_string()),
        EngineState::Creating => (StatusLevel::Info, "Map: creating renderer…".to_string()),
        EngineState::StyleRequesting { attempt: 1 } => {
            (StatusLevel::Info, "Map: loading style…".to_string())
        }
        EngineState::StyleRequesting { .. } => (
            StatusLevel::Warning,
            "Map: primary style failed, loading fallback style…".to_string(),
        ),
        EngineState::StyleLoaded => (StatusLevel::Info, "Map: painting…".to_string()),
        EngineState::Ready => (
            StatusLevel::Ok,
            format!(
                "Map: ready ({})",
                renderer.unwrap_or(RendererKind::Primary).as_str()
            ),
        ),
        EngineState::Error { reason } => (StatusLevel::Error, format!("Map: error ({})", reason)),
        EngineState::FallbackActive { reason } => {
            let text = match renderer {
                Some(_) => format!("Map: fallback renderer active ({})", reason),
                None => format!("Map: unavailable ({})", reason),
            };
            (StatusLevel::Warning, text)
        }
    };
    report.push(level, text);
}

fn feed_lines(report: &mut StatusReport, feed: &FeedStatus) {
    let interval = feed.refresh_interval.as_secs();
    if feed.shut_down {
        report.push(StatusLevel::Info, "Feed: stopped");
        return;
    }

    if feed.paused {
        report.push(StatusLevel::Info, "Paused");
    } else if !feed.push_enabled {
        report.push(StatusLevel::Info, format!("Polling every {}s", interval));
    } else if feed.connected {
        report.push(StatusLevel::Ok, "Live: connected");
    } else {
        report.push(
            StatusLevel::Warning,
            format!("Live: disconnected, polling every {}s", interval),
        );
    }

    if let Some(error) = &feed.channel_error {
        report.push(StatusLevel::Warning, format!("Live channel error: {}", error));
    }
    if let Some(error) = &feed.poll_error {
        report.push(StatusLevel::Warning, format!("Poll failed: {}", error));
    }
    if let (Some(at), Some(origin), Some(generation)) =
        (feed.last_received_at, feed.last_origin, feed.last_generation)
    {
        report.push(
            StatusLevel::Info,
            format!(
                "Updated {} via {} (#{})",
                at.format("%H:%M:%S UTC"),
                origin.as_str(),
                generation
            ),
        );
    }
}

fn snapshot_lines(report: &mut StatusReport, published: &PublishedSnapshot) {
    let snapshot = &published.snapshot;
    let (flights, ships) = snapshot.kind_counts();
    report.push(
        StatusLevel::Info,
        format!("Tracking {} flights, {} ships", flights, ships),
    );

    for warning in &snapshot.warnings {
        report.push(StatusLevel::Warning, warning.clone());
    }

    if snapshot.is_truncated() {
        report.push(
            StatusLevel::Info,
            format!(
                "Feed truncated: {} of {} delivered",
                snapshot.points.len(),
                snapshot.count
            ),
        );
    }

    let invalid = snapshot.invalid_position_count();
    if invalid > 0 {
        report.push(
            StatusLevel::Info,
            format!("{} without position", plural(invalid, "point", "points")),
        );
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeedMode, PointKind, SnapshotOrigin, TrackerPoint, TrackerSnapshot};
    use std::time::Duration;

    fn feed_status() -> FeedStatus {
        FeedStatus {
            mode: FeedMode::Combined,
            refresh_interval: Duration::from_secs(10),
            push_enabled: true,
            connected: true,
            paused: false,
            channel_error: None,
            poll_error: None,
            last_generation: None,
            last_origin: None,
            last_received_at: None,
            stale_dropped: 0,
            push_messages: 0,
            polls_issued: 0,
            poll_failures: 0,
            channel_opens: 1,
            active_timers: 1,
            shut_down: false,
        }
    }

    #[test]
    fn test_warning_passes_through_verbatim() {
        let snapshot = PublishedSnapshot::new(
            2,
            SnapshotOrigin::Push,
            TrackerSnapshot::default().with_warning("no data"),
        );
        let state = EngineState::Ready;
        let report = compose(StatusInputs {
            snapshot: Some(&snapshot),
            renderer: Some(RendererKind::Primary),
            ..StatusInputs::new(&state)
        });

        assert!(report.contains("no data"));
        assert!(report.contains("Map: ready (vector)"));
        assert!(report.contains("Tracking 0 flights, 0 ships"));
        assert_eq!(report.worst(), StatusLevel::Warning);
    }

    #[test]
    fn test_fallback_and_disconnected_feed() {
        let mut feed = feed_status();
        feed.connected = false;
        feed.channel_error = Some("connection reset".to_string());
        feed.poll_error = Some("HTTP 502 from http://feed/snapshot".to_string());
        let state = EngineState::FallbackActive {
            reason: "no adapter".to_string(),
        };

        let report = compose(StatusInputs {
            feed: Some(&feed),
            renderer: Some(RendererKind::Fallback),
            ..StatusInputs::new(&state)
        });

        assert_eq!(
            report.texts(),
            vec![
                "Map: fallback renderer active (no adapter)",
                "Live: disconnected, polling every 10s",
                "Live channel error: connection reset",
                "Poll failed: HTTP 502 from http://feed/snapshot",
            ]
        );
    }

    #[test]
    fn test_paused_feed() {
        let mut feed = feed_status();
        feed.paused = true;
        let state = EngineState::EngineLoading;
        let report = compose(StatusInputs {
            feed: Some(&feed),
            ..StatusInputs::new(&state)
        });
        assert_eq!(report.texts(), vec!["Map: loading engine…", "Paused"]);
    }

    #[test]
    fn test_counts_truncation_and_probe_lines() {
        let mut snapshot = TrackerSnapshot::from_points(vec![
            TrackerPoint::new("a", PointKind::Flight, 1.0, 1.0),
            TrackerPoint::without_position("b", PointKind::Ship),
        ]);
        snapshot.count = 40;
        let published = PublishedSnapshot::new(1, SnapshotOrigin::Poll, snapshot);
        let diagnostics = vec![
            DiagnosticEntry::ok("sprite image"),
            DiagnosticEntry::failed("glyphs", "timeout"),
        ];
        let render = RenderOutcome {
            generation: 1,
            rendered: 1,
            truncated: 3,
            ..RenderOutcome::default()
        };
        let state = EngineState::Ready;

        let report = compose(StatusInputs {
            snapshot: Some(&published),
            render: Some(render),
            diagnostics: &diagnostics,
            ..StatusInputs::new(&state)
        });

        assert!(report.contains("Tracking 1 flights, 1 ships"));
        assert!(report.contains("Feed truncated: 2 of 40 delivered"));
        assert!(report.contains("1 point without position"));
        assert!(report.contains("Showing 1 of 4 positioned points"));
        assert!(report.contains("sprite image: ok"));
        assert!(report.contains("glyphs: timeout"));
    }
}
