//! Status pane.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use trackdeck::status::{StatusLevel, StatusReport};

pub struct StatusWidget<'a> {
    report: &'a StatusReport,
}

impl<'a> StatusWidget<'a> {
    pub fn new(report: &'a StatusReport) -> Self {
        Self { report }
    }

    pub fn color(level: StatusLevel) -> Color {
        match level {
            StatusLevel::Ok => Color::Green,
            StatusLevel::Info => Color::White,
            StatusLevel::Warning => Color::Yellow,
            StatusLevel::Error => Color::Red,
        }
    }
}

impl Widget for StatusWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines: Vec<Line> = self
            .report
            .lines
            .iter()
            .map(|line| Line::styled(line.text.clone(), Style::default().fg(Self::color(line.level))))
            .collect();

        let border = match self.report.worst() {
            StatusLevel::Ok | StatusLevel::Info => Color::DarkGray,
            level => Self::color(level),
        };

        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Status ")
                    .border_style(Style::default().fg(border)),
            )
            .render(area, buf);
    }
}
