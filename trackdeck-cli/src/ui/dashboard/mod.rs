//! Interactive terminal dashboard.
//!
//! Owns the terminal for the lifetime of the view: raw mode and the
//! alternate screen are entered in [`Dashboard::new`] and left again in
//! [`Dashboard::restore`] or on drop.

pub mod utils;

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Terminal,
};
use trackdeck::engine::{MarkerFeature, RendererKind, Surface, Viewport};
use trackdeck::model::PublishedSnapshot;
use trackdeck::status::StatusReport;

use super::widgets::{MapWidget, PointsWidget, StatusWidget};

/// Braille cells pack 2x4 dots, which is what the map canvas draws with.
const DOTS_PER_COLUMN: u32 = 2;
const DOTS_PER_ROW: u32 = 4;

const MAX_STATUS_HEIGHT: u16 = 10;

/// User input the dashboard understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    Quit,
    TogglePause,
    Fit,
    Diagnostics,
}

/// Everything drawn in one frame.
pub struct DashboardView<'a> {
    pub features: &'a [MarkerFeature],
    pub viewport: Option<Viewport>,
    pub renderer: Option<RendererKind>,
    pub snapshot: Option<&'a PublishedSnapshot>,
    pub report: &'a StatusReport,
    pub paused: bool,
}

pub struct Dashboard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl Dashboard {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(Self {
            terminal,
            restored: false,
        })
    }

    /// Draw one frame. Returns the drawable size of the map pane.
    pub fn draw(&mut self, view: &DashboardView<'_>) -> io::Result<Surface> {
        let mut map_area = Rect::default();
        self.terminal.draw(|frame| {
            let (map, points, status, footer) = split(frame.area(), view.report.lines.len());
            map_area = map;

            frame.render_widget(
                MapWidget::new(view.features, view.viewport)
                    .kind(view.renderer)
                    .paused(view.paused),
                map,
            );
            frame.render_widget(PointsWidget::new(view.snapshot), points);
            frame.render_widget(StatusWidget::new(view.report), status);
            frame.render_widget(help_line(view.paused), footer);
        })?;
        Ok(surface_for(map_area))
    }

    /// Wait up to `timeout` for a key press.
    pub fn poll_event(&self, timeout: Duration) -> io::Result<Option<DashboardEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(key_event(key)),
            _ => Ok(None),
        }
    }

    pub fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "Failed to restore terminal");
        }
    }
}

/// Map and point list side by side, status and key help below.
fn split(area: Rect, status_lines: usize) -> (Rect, Rect, Rect, Rect) {
    let status_height = (status_lines as u16).saturating_add(2).min(MAX_STATUS_HEIGHT);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(status_height),
            Constraint::Length(1),
        ])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(rows[0]);
    (columns[0], columns[1], rows[1], rows[2])
}

/// Canvas resolution inside a bordered pane.
fn surface_for(area: Rect) -> Surface {
    let cols = area.width.saturating_sub(2) as u32;
    let rows = area.height.saturating_sub(2) as u32;
    Surface::new(cols * DOTS_PER_COLUMN, rows * DOTS_PER_ROW)
}

fn key_event(key: KeyEvent) -> Option<DashboardEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(DashboardEvent::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(DashboardEvent::Quit),
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(DashboardEvent::TogglePause),
        KeyCode::Char('f') => Some(DashboardEvent::Fit),
        KeyCode::Char('d') => Some(DashboardEvent::Diagnostics),
        _ => None,
    }
}

fn help_line(paused: bool) -> Paragraph<'static> {
    let key = Style::default().fg(Color::Cyan);
    let pause = if paused { "resume" } else { "pause" };
    Paragraph::new(Line::from(vec![
        Span::styled(" p", key),
        Span::raw(format!(" {}  ", pause)),
        Span::styled("f", key),
        Span::raw(" fit  "),
        Span::styled("d", key),
        Span::raw(" diagnostics  "),
        Span::styled("q", key),
        Span::raw(" quit"),
    ]))
}
