//! Catalog layer metadata and tile output formats.

use serde::{Deserialize, Serialize};

use crate::Geometry;

/// Raster tile encoding of a layer's published tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileOutputFormat {
    #[serde(rename = "PNG")]
    Png,
    #[serde(rename = "JPEG")]
    Jpeg,
}

/// How the packaging worker mixes tile formats in the output archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileFormatStrategy {
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "mixed")]
    Mixed,
}

/// Metadata of a catalog layer, as resolved from the Catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetadata {
    /// Catalog record identifier.
    pub id: String,

    /// Product identifier (used as the job's resource id).
    pub product_id: String,

    /// Product version.
    pub product_version: String,

    /// Product type, e.g. "Orthophoto".
    pub product_type: String,

    /// The layer's native resolution in degrees per pixel.
    pub max_resolution_deg: f64,

    /// The layer's geographic coverage polygon.
    pub footprint: Geometry,

    /// Tile encoding of the layer's published tiles.
    pub tile_output_format: TileOutputFormat,
}
