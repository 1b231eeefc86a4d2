//! Concurrent reachability checks for a style and the resources it names.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info};

use super::template::{expand_glyph_url, expand_tile_url};
use super::DiagnosticEntry;
use crate::coord::TileCoord;
use crate::engine::{resolve_url, StyleDocument, StyleSource, TileJson};
use crate::http::{AsyncHttpClient, HttpError};

/// Per-check timeout used when none is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(6);

/// Tile requested from the first tile-bearing source.
pub const SAMPLE_TILE: TileCoord = TileCoord {
    row: 1,
    col: 2,
    zoom: 2,
};

/// Glyph range requested from the glyph endpoint.
pub const GLYPH_RANGE: &str = "0-255";

/// Why one check failed. Displayed verbatim as the entry status.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("{0}")]
    Network(String),

    #[error("invalid document: {0}")]
    Invalid(String),

    #[error("{0}")]
    Missing(String),
}

impl From<HttpError> for ProbeError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Timeout => ProbeError::Timeout,
            other => ProbeError::Network(other.to_string()),
        }
    }
}

/// Runs diagnostics against one HTTP client.
#[derive(Clone)]
pub struct DiagnosticsProbe {
    http: Arc<dyn AsyncHttpClient>,
    timeout: Duration,
}

impl DiagnosticsProbe {
    pub fn new(http: Arc<dyn AsyncHttpClient>) -> Self {
        Self {
            http,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ProbeError> {
        let response = tokio::time::timeout(self.timeout, self.http.get(url))
            .await
            .map_err(|_| ProbeError::Timeout)??;
        if !response.is_success() {
            return Err(ProbeError::HttpStatus(response.status));
        }
        Ok(response.body)
    }

    async fn check(&self, label: String, url: String) -> DiagnosticEntry {
        match self.fetch(&url).await {
            Ok(_) => DiagnosticEntry::ok(label),
            Err(e) => {
                debug!(label = %label, url = %url, error = %e, "Probe check failed");
                DiagnosticEntry::failed(label, e)
            }
        }
    }

    /// Check the style at `style_url`, then its sprite, glyphs and a sample
    /// tile. The checks after the style run concurrently and independently.
    pub async fn run(&self, style_url: &str) -> Vec<DiagnosticEntry> {
        let style = match self.fetch(style_url).await.and_then(|body| {
            StyleDocument::from_json(&body).map_err(|e| ProbeError::Invalid(e.to_string()))
        }) {
            Ok(style) => style,
            Err(e) => {
                info!(url = %style_url, error = %e, "Style unreachable, skipping dependent checks");
                return vec![DiagnosticEntry::failed("style", e)];
            }
        };

        let mut targets = Vec::new();
        if let Some(sprite) = style
            .sprite_url()
            .and_then(|sprite| resolve_url(style_url, &sprite))
        {
            targets.push(("sprite image".to_string(), format!("{}.png", sprite)));
            targets.push(("sprite metadata".to_string(), format!("{}.json", sprite)));
        }
        if let Some(glyphs) = style
            .glyphs
            .as_deref()
            .and_then(|glyphs| resolve_url(style_url, glyphs))
        {
            targets.push((
                "glyphs".to_string(),
                expand_glyph_url(&glyphs, &style.font_stack(), GLYPH_RANGE),
            ));
        }

        let direct = join_all(
            targets
                .into_iter()
                .map(|(label, url)| self.check(label, url)),
        );
        let tile = self.check_tile(style_url, style.first_tile_source());
        let (direct, tile) = tokio::join!(direct, tile);

        let mut entries = Vec::with_capacity(direct.len() + tile.len() + 1);
        entries.push(DiagnosticEntry::ok(format!("style ({})", style.display_name())));
        entries.extend(direct);
        entries.extend(tile);

        let failed = entries.iter().filter(|e| !e.is_ok()).count();
        info!(url = %style_url, checks = entries.len(), failed, "Diagnostics complete");
        entries
    }

    /// Sample one tile, following a TileJSON reference one level when the
    /// source has no inline `tiles`.
    async fn check_tile(
        &self,
        style_url: &str,
        source: Option<(&str, StyleSource)>,
    ) -> Vec<DiagnosticEntry> {
        let Some((name, source)) = source else {
            return vec![DiagnosticEntry::failed(
                "tile",
                ProbeError::Missing("no tile source".to_string()),
            )];
        };
        let tile_label = format!("tile ({})", name);

        if let Some(template) = source.tiles.first() {
            let Some(template) = resolve_url(style_url, template) else {
                return vec![DiagnosticEntry::failed(tile_label, "unresolvable tile URL")];
            };
            return vec![self.check(tile_label, expand_tile_url(&template, &SAMPLE_TILE)).await];
        }

        let tilejson_label = format!("tilejson ({})", name);
        let Some(url) = source
            .url
            .as_deref()
            .and_then(|url| resolve_url(style_url, url))
        else {
            return vec![DiagnosticEntry::failed(tile_label, "source has no tiles")];
        };

        let document = self.fetch(&url).await.and_then(|body| {
            serde_json::from_slice::<TileJson>(&body).map_err(|e| ProbeError::Invalid(e.to_string()))
        });
        let tilejson = match document {
            Ok(tilejson) => tilejson,
            Err(e) => return vec![DiagnosticEntry::failed(tilejson_label, e)],
        };

        let tile = match tilejson
            .tiles
            .first()
            .and_then(|template| resolve_url(&url, template))
        {
            Some(template) => {
                self.check(tile_label, expand_tile_url(&template, &SAMPLE_TILE))
                    .await
            }
            None => DiagnosticEntry::failed(tile_label, "tilejson lists no tiles"),
        };
        vec![DiagnosticEntry::ok(tilejson_label), tile]
    }
}
