//! Style documents.
//!
//! Only the subset of the MapLibre style format the renderers and the
//! diagnostics probe use is modelled: version, name, sprite, glyphs, sources
//! and a few layer properties. Unknown fields are ignored.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{EngineError, EngineResult};
use crate::http::AsyncHttpClient;

/// The only style specification version accepted.
pub const STYLE_VERSION: u64 = 8;

/// Font stack used when no symbol layer names one.
pub const DEFAULT_FONT_STACK: &str = "Open Sans Regular";

/// A parsed style document.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleDocument {
    pub version: u64,

    #[serde(default)]
    pub name: Option<String>,

    /// Either a URL string or a list of `{id, url}` objects.
    #[serde(default)]
    pub sprite: Option<Value>,

    #[serde(default)]
    pub glyphs: Option<String>,

    /// Kept as a JSON map so source order is preserved.
    #[serde(default)]
    pub sources: Map<String, Value>,

    #[serde(default)]
    pub layers: Vec<StyleLayer>,
}

/// A data source entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StyleSource {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub tiles: Vec<String>,

    /// TileJSON indirection.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(rename = "tileSize", default)]
    pub tile_size: Option<u32>,
}

impl StyleSource {
    /// Raster and vector sources are tile-bearing.
    pub fn is_tiled(&self) -> bool {
        matches!(self.kind.as_str(), "raster" | "vector" | "raster-dem")
    }
}

/// A style layer.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleLayer {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub layout: Map<String, Value>,

    #[serde(default)]
    pub paint: Map<String, Value>,
}

/// A TileJSON document, as referenced by a source `url`.
#[derive(Debug, Clone, Deserialize)]
pub struct TileJson {
    #[serde(default)]
    pub tiles: Vec<String>,
}

impl StyleDocument {
    /// Parse and validate a style document.
    pub fn from_json(bytes: &[u8]) -> EngineResult<Self> {
        let style: StyleDocument = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::Style(format!("invalid style document: {}", e)))?;
        if style.version != STYLE_VERSION {
            return Err(EngineError::Style(format!(
                "unsupported style version {}",
                style.version
            )));
        }
        Ok(style)
    }

    /// Display name, or `"unnamed"`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Base URL of the sprite sheet (without `.png` / `.json`).
    pub fn sprite_url(&self) -> Option<String> {
        match self.sprite.as_ref()? {
            Value::String(url) => Some(url.clone()),
            Value::Array(entries) => entries
                .iter()
                .find_map(|entry| entry.get("url")?.as_str().map(str::to_string)),
            _ => None,
        }
    }

    /// Sources in document order. Entries that do not parse are skipped.
    pub fn sources(&self) -> impl Iterator<Item = (&str, StyleSource)> + '_ {
        self.sources.iter().filter_map(|(name, value)| {
            serde_json::from_value::<StyleSource>(value.clone())
                .ok()
                .map(|source| (name.as_str(), source))
        })
    }

    /// First source carrying `tiles` or a TileJSON `url`.
    pub fn first_tile_source(&self) -> Option<(&str, StyleSource)> {
        self.sources()
            .find(|(_, source)| source.is_tiled() && (!source.tiles.is_empty() || source.url.is_some()))
    }

    /// First font of the first symbol layer with a `text-font`.
    pub fn first_font(&self) -> Option<String> {
        self.layers
            .iter()
            .filter(|layer| layer.kind == "symbol")
            .find_map(|layer| {
                layer
                    .layout
                    .get("text-font")?
                    .as_array()?
                    .first()?
                    .as_str()
                    .map(str::to_string)
            })
    }

    /// Font stack for glyph requests.
    pub fn font_stack(&self) -> String {
        self.first_font()
            .unwrap_or_else(|| DEFAULT_FONT_STACK.to_string())
    }

    /// `background-color` of the first background layer, if it is a plain string.
    pub fn background_color(&self) -> Option<String> {
        self.layers
            .iter()
            .find(|layer| layer.kind == "background")
            .and_then(|layer| layer.paint.get("background-color")?.as_str().map(str::to_string))
    }
}

/// Resolve a possibly relative reference against the URL of the document
/// that contains it.
///
/// Template tokens such as `{z}` or `{fontstack}` survive resolution.
pub fn resolve_url(base: &str, reference: &str) -> Option<String> {
    if reference.contains("://") {
        return Some(reference.to_string());
    }
    let joined = Url::parse(base).ok()?.join(reference).ok()?;
    Some(joined.as_str().replace("%7B", "{").replace("%7D", "}"))
}

/// Fetch and parse a style document.
pub async fn fetch_style(http: &dyn AsyncHttpClient, url: &str) -> EngineResult<StyleDocument> {
    let response = http
        .get(url)
        .await
        .map_err(|e| EngineError::Style(e.to_string()))?;
    if !response.is_success() {
        return Err(EngineError::Style(format!("HTTP {}", response.status)));
    }
    StyleDocument::from_json(&response.body)
}

/// Parse an `#rgb`, `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)` colour.
pub fn parse_color(value: &str) -> Option<(u8, u8, u8, u8)> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some((r * 17, g * 17, b * 17, 255)),
            [r1, r2, g1, g2, b1, b2] => Some((r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, 255)),
            _ => None,
        };
    }

    let inner = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let channel = |s: &str| s.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0) as u8);
    match parts.as_slice() {
        [r, g, b] => Some((channel(*r)?, channel(*g)?, channel(*b)?, 255)),
        [r, g, b, a] => {
            let alpha = a.parse::<f64>().ok()?.clamp(0.0, 1.0);
            Some((
                channel(*r)?,
                channel(*g)?,
                channel(*b)?,
                (alpha * 255.0).round() as u8,
            ))
        }
        _ => None,
    }
}
