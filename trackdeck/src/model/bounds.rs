//! Geographic bounding boxes.

/// A latitude/longitude bounding box in degrees.
///
/// Boxes never wrap the antimeridian: `west <= east` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// The whole Web Mercator world.
    pub const WORLD: GeoBounds = GeoBounds {
        south: -85.05112878,
        west: -180.0,
        north: 85.05112878,
        east: 180.0,
    };

    /// A degenerate box around a single position.
    pub fn from_point(lat: f64, lon: f64) -> Self {
        Self {
            south: lat,
            west: lon,
            north: lat,
            east: lon,
        }
    }

    /// Smallest box containing every position, or `None` for an empty input.
    ///
    /// Non-finite positions are skipped.
    pub fn from_positions<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        positions
            .into_iter()
            .filter(|(lat, lon)| lat.is_finite() && lon.is_finite())
            .fold(None, |acc: Option<GeoBounds>, (lat, lon)| match acc {
                None => Some(GeoBounds::from_point(lat, lon)),
                Some(b) => Some(b.extend(lat, lon)),
            })
    }

    /// Grow the box to include a position.
    pub fn extend(self, lat: f64, lon: f64) -> Self {
        Self {
            south: self.south.min(lat),
            west: self.west.min(lon),
            north: self.north.max(lat),
            east: self.east.max(lon),
        }
    }

    /// Centre of the box as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// Whether the position lies inside the box (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lon)
    }

    /// Latitude span in degrees.
    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_empty() {
        assert!(GeoBounds::from_positions(Vec::<(f64, f64)>::new()).is_none());
    }

    #[test]
    fn test_from_positions_spans_all() {
        let bounds =
            GeoBounds::from_positions(vec![(40.0, -70.0), (42.0, -75.0), (41.0, -71.0)]).unwrap();
        assert_eq!(bounds.south, 40.0);
        assert_eq!(bounds.north, 42.0);
        assert_eq!(bounds.west, -75.0);
        assert_eq!(bounds.east, -70.0);
        assert_eq!(bounds.center(), (41.0, -72.5));
        assert!(bounds.contains(41.0, -72.0));
        assert!(!bounds.contains(43.0, -72.0));
    }

    #[test]
    fn test_from_positions_skips_non_finite() {
        let bounds = GeoBounds::from_positions(vec![(f64::NAN, 0.0), (10.0, 20.0)]).unwrap();
        assert_eq!(bounds, GeoBounds::from_point(10.0, 20.0));
    }
}
