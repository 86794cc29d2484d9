//! Region-of-interest normalization.
//!
//! Turns a request's feature collection into per-feature geometry records
//! with resolved zoom levels. Features that carry no usable target
//! resolution are dropped, not rejected.

use serde::{Deserialize, Serialize};
use tracing::debug;

use export_common::grid::{
    degrees_per_pixel_to_zoom_level, zoom_level_to_resolution_meter, ZOOM_ZERO_RESOLUTION,
};
use export_common::{BoundingBox, ExportError, ExportResult, FeatureCollection, Geometry};

/// A normalized export feature with its resolved zoom band.
///
/// `sanitized_box` stays empty until footprint validation computes the
/// grid-aligned intersection box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeometryRecord {
    pub geometry: Geometry,
    pub target_resolution_deg: f64,
    pub target_resolution_meter: f64,
    pub min_resolution_deg: f64,
    pub zoom_level: u8,
    pub min_zoom_level: u8,
    pub sanitized_box: Option<BoundingBox>,
}

/// Normalize a feature collection into geometry records, preserving feature
/// order.
pub fn parse_feature_collection(roi: &FeatureCollection) -> ExportResult<Vec<GeometryRecord>> {
    let mut records = Vec::with_capacity(roi.features.len());

    for feature in &roi.features {
        let target_resolution_deg = match feature.properties.and_then(|p| p.max_resolution_deg) {
            Some(resolution) if resolution > 0.0 => resolution,
            _ => {
                debug!("Skipping feature without a target resolution");
                continue;
            }
        };

        let zoom_level = degrees_per_pixel_to_zoom_level(target_resolution_deg)
            .map_err(|e| ExportError::InvalidRequest(e.to_string()))?;
        let min_resolution_deg = feature
            .properties
            .and_then(|p| p.min_resolution_deg)
            .unwrap_or(ZOOM_ZERO_RESOLUTION);
        let min_zoom_level = degrees_per_pixel_to_zoom_level(min_resolution_deg)
            .map_err(|e| ExportError::InvalidRequest(e.to_string()))?;

        records.push(GeometryRecord {
            geometry: feature.geometry.clone(),
            target_resolution_deg,
            target_resolution_meter: zoom_level_to_resolution_meter(zoom_level),
            min_resolution_deg,
            zoom_level,
            min_zoom_level,
            sanitized_box: None,
        });
    }

    Ok(records)
}
