//! Tracked entity positions as delivered by the point feed.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// What kind of entity a point represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    /// An aircraft.
    #[serde(alias = "aircraft", alias = "FLIGHT")]
    Flight,
    /// A vessel.
    #[serde(alias = "vessel", alias = "SHIP")]
    Ship,
}

impl PointKind {
    /// Short lowercase name used in listings and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Flight => "flight",
            PointKind::Ship => "ship",
        }
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked entity at a moment in time.
///
/// Coordinates are optional: the feed regularly carries entities whose
/// position is unknown. Such points stay visible in listings and counts but
/// are never handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerPoint {
    /// Stable identifier, unique within a snapshot.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    /// Flight or ship.
    pub kind: PointKind,

    /// Free-form classification (e.g. "cargo", "military").
    #[serde(default, deserialize_with = "deserialize_text")]
    pub category: String,

    /// Display name (callsign, vessel name).
    #[serde(default, deserialize_with = "deserialize_text")]
    pub label: String,

    /// Latitude in degrees. `None` when missing or not a finite number.
    #[serde(default, deserialize_with = "deserialize_number")]
    pub lat: Option<f64>,

    /// Longitude in degrees. `None` when missing or not a finite number.
    #[serde(default, deserialize_with = "deserialize_number")]
    pub lon: Option<f64>,

    /// Altitude in feet (ships have none).
    #[serde(default, deserialize_with = "deserialize_number")]
    pub altitude: Option<f64>,

    /// Ground speed in knots.
    #[serde(default, deserialize_with = "deserialize_number")]
    pub speed: Option<f64>,

    /// Country of registration / flag state.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub country: String,

    /// Operating airline or shipping company.
    #[serde(default, alias = "operator_name", deserialize_with = "deserialize_text")]
    pub operator: String,
}

impl TrackerPoint {
    /// Create a point with the given identity and position.
    pub fn new(id: impl Into<String>, kind: PointKind, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            category: String::new(),
            label: String::new(),
            lat: Some(lat),
            lon: Some(lon),
            altitude: None,
            speed: None,
            country: String::new(),
            operator: String::new(),
        }
    }

    /// Create a point without a known position.
    pub fn without_position(id: impl Into<String>, kind: PointKind) -> Self {
        Self {
            lat: None,
            lon: None,
            ..Self::new(id, kind, 0.0, 0.0)
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns `(lat, lon)` if both coordinates are present, finite and
    /// within the valid geographic range.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.lat?;
        let lon = self.lon?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some((lat, lon))
    }

    /// Whether this point may be handed to a renderer.
    pub fn has_valid_position(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Label for display, falling back to the identifier.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Identifiers arrive as strings from most feeds, but some send numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {}",
            other
        ))),
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Numbers may arrive as JSON numbers, numeric strings, or null. Anything
/// that does not yield a finite value becomes `None`.
fn deserialize_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}
