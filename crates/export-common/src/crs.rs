//! Coordinate Reference System types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known CRS codes understood by the export service.
///
/// Export jobs are only admitted in EPSG:4326; the remaining codes exist so
/// a request carrying them parses and can be rejected with a useful message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    #[serde(rename = "EPSG:4326")]
    Epsg4326,
    /// Web Mercator (meters)
    #[serde(rename = "EPSG:3857")]
    Epsg3857,
}

impl CrsCode {
    /// Parse a CRS string as supplied in export requests.
    ///
    /// Accepts formats like "EPSG:4326", "epsg:4326" and "CRS:84".
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
        };
        write!(f, "{}", code)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
