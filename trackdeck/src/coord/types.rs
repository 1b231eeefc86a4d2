//! Coordinate types and constants for Web Mercator tile math.

use std::fmt;

use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level used by raster tile sources.
pub const MAX_ZOOM: u8 = 19;

/// Edge length of a raster tile in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// A Web Mercator tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Tile row (Y, 0 = north).
    pub row: u32,
    /// Tile column (X, 0 = west).
    pub col: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Errors from coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0}")]
    InvalidZoom(u8),
}
