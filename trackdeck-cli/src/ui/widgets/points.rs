//! Point list: every point of the active snapshot, including the ones the
//! map cannot place.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, Widget},
};
use trackdeck::model::{PointKind, PublishedSnapshot, TrackerPoint};

use super::map::{FLIGHT_COLOR, SHIP_COLOR};

pub struct PointsWidget<'a> {
    snapshot: Option<&'a PublishedSnapshot>,
}

impl<'a> PointsWidget<'a> {
    pub fn new(snapshot: Option<&'a PublishedSnapshot>) -> Self {
        Self { snapshot }
    }

    fn position(point: &TrackerPoint) -> String {
        match point.coordinates() {
            Some((lat, lon)) => format!("{:>7.3} {:>8.3}", lat, lon),
            None => "no position".to_string(),
        }
    }

    fn row(point: &TrackerPoint) -> Row<'static> {
        let (tag, color) = match point.kind {
            PointKind::Flight => ("FLT", FLIGHT_COLOR),
            PointKind::Ship => ("SHP", SHIP_COLOR),
        };
        let position_style = if point.has_valid_position() {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Row::new(vec![
            Cell::from(tag).style(Style::default().fg(color)),
            Cell::from(point.display_label().to_string()),
            Cell::from(Self::position(point)).style(position_style),
        ])
    }
}

impl Widget for PointsWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let points: &[TrackerPoint] = self
            .snapshot
            .map(|published| published.snapshot.points.as_slice())
            .unwrap_or_default();

        let title = match self.snapshot {
            Some(published) => format!(" Points · #{} ", published.generation),
            None => " Points ".to_string(),
        };
        let visible = area.height.saturating_sub(3) as usize;

        let header = Row::new(vec!["", "Label", "Position"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows: Vec<Row> = points.iter().take(visible).map(Self::row).collect();

        Table::new(
            rows,
            [
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(16),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .render(area, buf);
    }
}
