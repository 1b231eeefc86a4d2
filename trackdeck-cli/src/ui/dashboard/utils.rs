//! Formatting helpers and non-TUI output used by headless mode.

use std::time::Duration;

use chrono::Local;
use trackdeck::feed::FeedStatus;
use trackdeck::status::StatusReport;

/// Format duration as HH:MM:SS or MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// One status report as a single line.
pub fn status_line(report: &StatusReport) -> String {
    report.texts().join(" | ")
}

/// Simple non-TUI fallback for non-interactive terminals.
pub fn print_simple_status(report: &StatusReport) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), status_line(report));
}

/// Print final session summary.
pub fn print_session_summary(status: &FeedStatus, fallback_entries: u32, uptime: Duration) {
    println!();
    println!("Session Summary");
    println!("───────────────");
    println!(
        "  Snapshots: {} pushed, {} polled ({} poll failures)",
        status.push_messages, status.polls_issued, status.poll_failures
    );
    println!("  Stale updates dropped: {}", status.stale_dropped);
    println!("  Live channel opens: {}", status.channel_opens);
    if let Some(generation) = status.last_generation {
        println!("  Last generation: #{}", generation);
    }
    if fallback_entries > 0 {
        println!("  Fallback renderer used: yes");
    }
    println!("  Uptime: {}", format_duration(uptime));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_empty_report_line() {
        assert_eq!(status_line(&StatusReport::default()), "");
    }
}
