//! Marker data model.
//!
//! A marker is one tracked device identified by `entity_id`. Every row written
//! to the table is a `(entity_id, sort_key)` pair carrying one position; the
//! change feed turns each inserted row into a [`ChangeEvent`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker classification.
///
/// - `Static`: position is fixed once created
/// - `Temporary`: position is fixed once created, the host expires it
/// - `Dynamic`: position changes over time and accumulates a history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    Static,
    Temporary,
    Dynamic,
}

impl Classification {
    /// Parse a stored classification tag, falling back to `Static`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Static => "static",
            Classification::Temporary => "temporary",
            Classification::Dynamic => "dynamic",
        }
    }
}

impl FromStr for Classification {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Classification::Static),
            "temporary" => Ok(Classification::Temporary),
            "dynamic" => Ok(Classification::Dynamic),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinate payload. Interpretation (WGS84, engine space) belongs to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One position of a marker at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Sort key of the row this location came from.
    pub sort_key: String,
    pub occurred_at: DateTime<Utc>,
    pub position: Position,
}

/// One decoded INSERT notification from the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub entity_id: String,
    /// String-encoded unix timestamp, unique within `entity_id`.
    pub sort_key: String,
    pub occurred_at: DateTime<Utc>,
    /// Feed-assigned capture time, used for replay windows.
    pub approx_capture_time: DateTime<Utc>,
    pub classification: Classification,
    pub position: Position,
    /// Observability only.
    pub sequence_number: String,
}

impl ChangeEvent {
    pub fn location(&self) -> Location {
        Location {
            sort_key: self.sort_key.clone(),
            occurred_at: self.occurred_at,
            position: self.position,
        }
    }

    /// The row this event announced.
    pub fn to_row(&self) -> MarkerRow {
        MarkerRow {
            entity_id: self.entity_id.clone(),
            classification: self.classification,
            location: self.location(),
        }
    }
}

/// A marker row as held by the entity store.
///
/// `(entity_id, location.sort_key)` is the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRow {
    pub entity_id: String,
    pub classification: Classification,
    pub location: Location,
}

impl MarkerRow {
    pub fn new(
        entity_id: impl Into<String>,
        classification: Classification,
        occurred_at: DateTime<Utc>,
        position: Position,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            classification,
            location: Location {
                sort_key: occurred_at.timestamp().to_string(),
                occurred_at,
                position,
            },
        }
    }
}
