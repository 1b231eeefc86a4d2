//! TUI application loop for the trackdeck CLI.
//!
//! # Architecture
//!
//! - `run_tui()` - Interactive dashboard with key handling
//! - `run_headless()` - Periodic status lines for non-TTY environments
//!
//! Both take an already started [`TrackerSession`]; the commands own its
//! startup and shutdown.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use trackdeck::session::TrackerSession;

use crate::error::CliError;
use crate::ui::dashboard::utils::{print_session_summary, print_simple_status};
use crate::ui::{Dashboard, DashboardEvent, DashboardView};

/// Redraw interval of the dashboard; also bounds key latency.
const TICK_RATE: Duration = Duration::from_millis(250);

/// Granularity of the headless shutdown check.
const HEADLESS_POLL: Duration = Duration::from_millis(100);

/// Flag set by Ctrl+C.
pub fn install_shutdown_handler() -> Result<Arc<AtomicBool>, CliError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Runtime(io::Error::other(e.to_string())))?;
    Ok(shutdown)
}

/// Run the interactive dashboard until the user quits.
///
/// The map pane's size is forwarded to the session whenever it changes, so
/// the active renderer always matches the visible canvas.
pub fn run_tui(session: &TrackerSession, shutdown: Arc<AtomicBool>) -> Result<(), CliError> {
    let started = Instant::now();
    let mut dashboard = Dashboard::new().map_err(CliError::Terminal)?;
    let mut last_surface = None;

    while !shutdown.load(Ordering::SeqCst) {
        let renderer = session.renderer();
        let features = renderer.as_ref().map(|r| r.features()).unwrap_or_default();
        let snapshot = session.latest_snapshot();
        let report = session.status_report();

        let view = DashboardView {
            features: &features,
            viewport: renderer.as_ref().map(|r| r.viewport()),
            renderer: renderer.as_ref().map(|r| r.kind()),
            snapshot: snapshot.as_ref(),
            report: &report,
            paused: session.is_paused(),
        };
        let surface = dashboard.draw(&view).map_err(CliError::Terminal)?;

        if last_surface != Some(surface) {
            last_surface = Some(surface);
            if surface.is_measured() {
                if let Err(e) = session.resize(surface) {
                    warn!(error = %e, surface = %surface, "Map resize rejected");
                }
            }
        }

        match dashboard.poll_event(TICK_RATE).map_err(CliError::Terminal)? {
            Some(DashboardEvent::Quit) => break,
            Some(DashboardEvent::TogglePause) => {
                let paused = session.toggle_pause();
                debug!(paused, "Pause toggled");
            }
            Some(DashboardEvent::Fit) => session.request_fit(),
            Some(DashboardEvent::Diagnostics) => session.run_diagnostics(),
            None => {}
        }
    }

    dashboard.restore().map_err(CliError::Terminal)?;
    print_session_summary(
        &session.feed_status(),
        session.fallback_entries(),
        started.elapsed(),
    );
    Ok(())
}

/// Print a status line every `interval` until Ctrl+C, or until `count`
/// lines have been printed.
pub fn run_headless(
    session: &TrackerSession,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
    count: Option<u64>,
) -> Result<(), CliError> {
    let started = Instant::now();
    println!("trackdeck running (headless). Press Ctrl+C to stop.");

    let mut printed = 0u64;
    'outer: while !shutdown.load(Ordering::SeqCst) {
        print_simple_status(&session.status_report());
        printed += 1;
        if count.is_some_and(|limit| printed >= limit) {
            break;
        }

        let tick = Instant::now();
        while tick.elapsed() < interval {
            if shutdown.load(Ordering::SeqCst) {
                break 'outer;
            }
            std::thread::sleep(HEADLESS_POLL);
        }
    }

    print_session_summary(
        &session.feed_status(),
        session.fallback_entries(),
        started.elapsed(),
    );
    Ok(())
}
