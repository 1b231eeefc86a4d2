//! Map pane: world outline plus the markers held by the active renderer.
//!
//! The canvas is bounded by the renderer's visible area, so camera fits and
//! resizes show up here the same way they do in an exported frame.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Map, MapResolution, Points},
        Block, Borders, Paragraph, Widget,
    },
};
use trackdeck::engine::{MarkerFeature, RendererKind, Viewport};
use trackdeck::model::PointKind;

pub const FLIGHT_COLOR: Color = Color::Cyan;
pub const SHIP_COLOR: Color = Color::Yellow;

/// Widget drawing the current marker set.
pub struct MapWidget<'a> {
    features: &'a [MarkerFeature],
    viewport: Option<Viewport>,
    kind: Option<RendererKind>,
    paused: bool,
}

impl<'a> MapWidget<'a> {
    pub fn new(features: &'a [MarkerFeature], viewport: Option<Viewport>) -> Self {
        Self {
            features,
            viewport,
            kind: None,
            paused: false,
        }
    }

    pub fn kind(mut self, kind: Option<RendererKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    fn title(&self) -> String {
        let renderer = match self.kind {
            Some(kind) => kind.as_str(),
            None => "no renderer",
        };
        let mut title = format!(" Map ({}) · {} markers ", renderer, self.features.len());
        if self.paused {
            title.push_str("· paused ");
        }
        title
    }

    fn coords(&self, kind: PointKind) -> Vec<(f64, f64)> {
        self.features
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| (f.lon, f.lat))
            .collect()
    }
}

impl Widget for MapWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .border_style(Style::default().fg(Color::DarkGray));

        let Some(viewport) = self.viewport else {
            Paragraph::new("  Map unavailable")
                .style(Style::default().fg(Color::DarkGray))
                .block(block)
                .render(area, buf);
            return;
        };

        let bounds = viewport.visible_bounds();
        let flights = self.coords(PointKind::Flight);
        let ships = self.coords(PointKind::Ship);

        Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([bounds.west, bounds.east])
            .y_bounds([bounds.south, bounds.north])
            .paint(|ctx| {
                ctx.draw(&Map {
                    resolution: MapResolution::High,
                    color: Color::DarkGray,
                });
                ctx.layer();
                ctx.draw(&Points {
                    coords: &ships,
                    color: SHIP_COLOR,
                });
                ctx.draw(&Points {
                    coords: &flights,
                    color: FLIGHT_COLOR,
                });
            })
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackdeck::engine::Surface;

    #[test]
    fn test_title_counts_markers() {
        let features = vec![
            MarkerFeature::new("a", PointKind::Flight, 10.0, 10.0),
            MarkerFeature::new("b", PointKind::Ship, 11.0, 11.0),
        ];
        let widget = MapWidget::new(&features, None)
            .kind(Some(RendererKind::Fallback))
            .paused(true);

        assert_eq!(widget.title(), " Map (raster) · 2 markers · paused ");
        assert_eq!(widget.coords(PointKind::Ship), vec![(11.0, 11.0)]);
    }

    #[test]
    fn test_renders_without_panicking() {
        let features = vec![MarkerFeature::new("a", PointKind::Flight, 48.1, 11.6)];
        let viewport = Viewport::new((48.1, 11.6), 5.0, Surface::new(80, 48));
        let area = Rect::new(0, 0, 40, 12);
        let mut buf = Buffer::empty(area);

        MapWidget::new(&features, Some(viewport)).render(area, &mut buf);
        MapWidget::new(&[], None).render(area, &mut buf);
    }
}
