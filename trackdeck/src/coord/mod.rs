//! Coordinate conversion module
//!
//! Conversions between geographic coordinates (latitude/longitude), Web
//! Mercator world pixels and tile addresses. Used by both renderers for
//! projection and viewport fitting, and by the diagnostics probe to derive a
//! sample tile URL.

mod types;

pub use types::{
    CoordError, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM, TILE_SIZE,
};

use std::f64::consts::PI;

use crate::model::GeoBounds;

/// Half the circumference of the EPSG:3857 world in metres.
const MERCATOR_HALF_EXTENT: f64 = 20_037_508.342_789_244;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 19)
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n as u32).saturating_sub(1);

    let col = (((lon + 180.0) / 360.0 * n) as u32).min(max_index);

    let lat_rad = lat * PI / 180.0;
    let row = (((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32).min(max_index);

    Ok(TileCoord { row, col, zoom })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lon = tile.col as f64 / n * 360.0 - 180.0;

    let y = tile.row as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

/// Projects a position to world pixel coordinates at a fractional zoom.
///
/// The world is `256 * 2^zoom` pixels wide; `(0, 0)` is the north-west
/// corner. Latitudes are clamped to the Mercator limits.
pub fn project(lat: f64, lon: f64, zoom: f64) -> (f64, f64) {
    let world = TILE_SIZE * 2.0_f64.powf(zoom);
    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let x = (lon + 180.0) / 360.0 * world;
    let lat_rad = lat.to_radians();
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * world;
    (x, y)
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64, zoom: f64) -> (f64, f64) {
    let world = TILE_SIZE * 2.0_f64.powf(zoom);
    let lon = x / world * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / world)).sinh().atan().to_degrees();
    (lat, lon)
}

/// Tile extent in EPSG:3857 metres as `[min_x, min_y, max_x, max_y]`.
///
/// This is the value substituted for `{bbox-epsg-3857}` in WMS-style tile
/// templates.
pub fn tile_bbox_epsg3857(tile: &TileCoord) -> [f64; 4] {
    let n = 2.0_f64.powi(tile.zoom as i32);
    let size = 2.0 * MERCATOR_HALF_EXTENT / n;
    let min_x = -MERCATOR_HALF_EXTENT + tile.col as f64 * size;
    let max_y = MERCATOR_HALF_EXTENT - tile.row as f64 * size;
    [min_x, max_y - size, min_x + size, max_y]
}

/// Bing-style quadkey for a tile.
pub fn tile_quadkey(tile: &TileCoord) -> String {
    (1..=tile.zoom)
        .rev()
        .map(|level| {
            let mask = 1u32 << (level - 1);
            let mut digit = 0u8;
            if tile.col & mask != 0 {
                digit += 1;
            }
            if tile.row & mask != 0 {
                digit += 2;
            }
            char::from(b'0' + digit)
        })
        .collect()
}

/// Largest zoom at which `bounds` fits in a `width` x `height` pixel area
/// with `padding` pixels kept free on every side.
///
/// Degenerate boxes (a single point) resolve to `max_zoom`.
pub fn zoom_for_bounds(
    bounds: &GeoBounds,
    width: u32,
    height: u32,
    padding: u32,
    max_zoom: f64,
) -> f64 {
    let usable_w = (width.saturating_sub(2 * padding)).max(1) as f64;
    let usable_h = (height.saturating_sub(2 * padding)).max(1) as f64;

    let (x0, y0) = project(bounds.north, bounds.west, 0.0);
    let (x1, y1) = project(bounds.south, bounds.east, 0.0);
    let span_x = (x1 - x0).abs();
    let span_y = (y1 - y0).abs();

    if span_x <= f64::EPSILON && span_y <= f64::EPSILON {
        return max_zoom;
    }

    let zoom_x = if span_x > f64::EPSILON {
        (usable_w / span_x).log2()
    } else {
        max_zoom
    };
    let zoom_y = if span_y > f64::EPSILON {
        (usable_h / span_y).log2()
    } else {
        max_zoom
    };

    zoom_x.min(zoom_y).clamp(MIN_ZOOM as f64, max_zoom)
}

/// Geographic area covered by a viewport of the given pixel size centred on
/// `center` at `zoom`.
pub fn visible_bounds(center: (f64, f64), zoom: f64, width: u32, height: u32) -> GeoBounds {
    let (cx, cy) = project(center.0, center.1, zoom);
    let half_w = width as f64 / 2.0;
    let half_h = height as f64 / 2.0;
    let (north, west) = unproject(cx - half_w, cy - half_h, zoom);
    let (south, east) = unproject(cx + half_w, cy + half_h, zoom);
    GeoBounds {
        south: south.max(MIN_LAT),
        west: west.max(MIN_LON),
        north: north.min(MAX_LAT),
        east: east.min(MAX_LON),
    }
}
