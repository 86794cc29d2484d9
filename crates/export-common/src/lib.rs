//! Common types and utilities shared across the raster export service crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geojson;
pub mod grid;
pub mod layer;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{ExportError, ExportResult};
pub use geojson::{Feature, FeatureCollection, FeatureProperties, Geometry};
pub use grid::{TileRange, MAX_ZOOM_LEVEL, ZOOM_ZERO_RESOLUTION};
pub use layer::{LayerMetadata, TileFormatStrategy, TileOutputFormat};
