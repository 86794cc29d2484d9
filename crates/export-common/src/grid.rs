//! WGS84 tile grid and zoom/resolution conversions.
//!
//! The export grid is a square quad-tree over the full EPSG:4326 extent:
//! zoom `z` has `2^z x 2^z` tiles, each spanning `360/2^z` degrees of
//! longitude and `180/2^z` degrees of latitude, origin at (-180, -90).
//! Zoom 0 is a single tile covering the world.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Finest supported zoom level.
pub const MAX_ZOOM_LEVEL: u8 = 22;

/// Resolution of zoom level 0 in degrees per pixel.
pub const ZOOM_ZERO_RESOLUTION: f64 = 0.703125;

/// Resolution in meters per pixel at the equator, indexed by zoom level.
const ZOOM_RESOLUTION_METER: [f64; 23] = [
    78271.52, 39135.76, 19567.88, 9783.94, 4891.97, 2445.98, 1222.99, 611.5, 305.75, 152.87,
    76.44, 38.22, 19.11, 9.55, 4.78, 2.39, 1.19, 0.6, 0.3, 0.15, 0.075, 0.037, 0.0185,
];

/// Resolution of a zoom level in degrees per pixel.
///
/// Exact in f64: each level halves the zoom 0 resolution.
pub fn zoom_level_to_resolution_deg(zoom: u8) -> f64 {
    ZOOM_ZERO_RESOLUTION / (1u64 << zoom) as f64
}

/// Resolution of a zoom level in meters per pixel at the equator.
pub fn zoom_level_to_resolution_meter(zoom: u8) -> f64 {
    ZOOM_RESOLUTION_METER[zoom as usize]
}

/// Map a degrees-per-pixel resolution to a zoom level.
///
/// Returns the highest zoom whose resolution is at least as coarse as the
/// requested one; resolutions finer than [`MAX_ZOOM_LEVEL`] clamp to it.
/// Resolutions coarser than zoom 0 are rejected.
pub fn degrees_per_pixel_to_zoom_level(resolution_deg: f64) -> Result<u8, GridError> {
    for zoom in (0..=MAX_ZOOM_LEVEL).rev() {
        if resolution_deg <= zoom_level_to_resolution_deg(zoom) {
            return Ok(zoom);
        }
    }
    Err(GridError::ResolutionOutOfRange(resolution_deg))
}

/// A contiguous range of tiles at one zoom level.
///
/// `max_x`/`max_y` are exclusive: the range covers
/// `(max_x - min_x) * (max_y - min_y)` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Number of tiles covered by this range.
    pub fn tile_count(&self) -> u64 {
        let width = (self.max_x - self.min_x) as u64;
        let height = (self.max_y - self.min_y) as u64;
        width * height
    }
}

/// Longitude span of one tile at a zoom level, in degrees.
fn tile_span_lon(zoom: u8) -> f64 {
    360.0 / (1u64 << zoom) as f64
}

/// Latitude span of one tile at a zoom level, in degrees.
fn tile_span_lat(zoom: u8) -> f64 {
    180.0 / (1u64 << zoom) as f64
}

/// Snap a bounding box outward to tile boundaries at the given zoom.
pub fn snap_bbox_to_grid(bbox: &BoundingBox, zoom: u8) -> BoundingBox {
    let span_x = tile_span_lon(zoom);
    let span_y = tile_span_lat(zoom);

    let snapped = BoundingBox::new(
        ((bbox.min_x + 180.0) / span_x).floor() * span_x - 180.0,
        ((bbox.min_y + 90.0) / span_y).floor() * span_y - 90.0,
        ((bbox.max_x + 180.0) / span_x).ceil() * span_x - 180.0,
        ((bbox.max_y + 90.0) / span_y).ceil() * span_y - 90.0,
    );
    snapped.clamped_to_world()
}

/// Compute the tile range covering a bounding box at the given zoom.
pub fn bbox_to_tile_range(bbox: &BoundingBox, zoom: u8) -> TileRange {
    let span_x = tile_span_lon(zoom);
    let span_y = tile_span_lat(zoom);
    let tiles = 1u64 << zoom;

    let min_x = ((bbox.min_x + 180.0) / span_x).floor().max(0.0) as u32;
    let min_y = ((bbox.min_y + 90.0) / span_y).floor().max(0.0) as u32;
    let max_x = (((bbox.max_x + 180.0) / span_x).ceil() as u64).min(tiles) as u32;
    let max_y = (((bbox.max_y + 90.0) / span_y).ceil() as u64).min(tiles) as u32;

    TileRange {
        min_x,
        min_y,
        max_x,
        max_y,
        zoom,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Invalid resolution {0}: coarser than zoom level 0")]
    ResolutionOutOfRange(f64),
}
