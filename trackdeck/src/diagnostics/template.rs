//! Placeholder substitution for tile and glyph URL templates.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::coord::{tile_bbox_epsg3857, tile_quadkey, TileCoord};

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-z0-9-]+)\}").unwrap())
}

/// Substitute `{z}`, `{x}`, `{y}`, `{-y}`, `{bbox-epsg-3857}`, `{quadkey}`,
/// `{s}` and `{ratio}` for one tile. Unknown tokens are left as they are.
pub fn expand_tile_url(template: &str, tile: &TileCoord) -> String {
    token_pattern()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "z" => tile.zoom.to_string(),
            "x" => tile.col.to_string(),
            "y" => tile.row.to_string(),
            "-y" => ((1u32 << tile.zoom) - 1 - tile.row).to_string(),
            "bbox-epsg-3857" => tile_bbox_epsg3857(tile)
                .iter()
                .map(|v| format!("{:.6}", v))
                .collect::<Vec<_>>()
                .join(","),
            "quadkey" => tile_quadkey(tile),
            "s" => "a".to_string(),
            "ratio" => String::new(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute `{fontstack}` and `{range}` in a glyph URL template.
pub fn expand_glyph_url(template: &str, font_stack: &str, range: &str) -> String {
    let font_stack = font_stack.replace(' ', "%20").replace(',', "%2C");
    token_pattern()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "fontstack" => font_stack.clone(),
            "range" => range.to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}
