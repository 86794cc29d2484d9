//! Footprint and zoom validation of normalized export features.

use tracing::debug;

use export_common::grid::snap_bbox_to_grid;
use export_common::{ExportError, ExportResult, Geometry};

use crate::geometry::intersection_bbox;
use crate::roi::GeometryRecord;

/// Check a record's zoom band against the source layer.
pub fn validate_zoom(
    record: &GeometryRecord,
    max_zoom: u8,
    source_resolution: f64,
) -> ExportResult<()> {
    if record.zoom_level > max_zoom {
        return Err(ExportError::InvalidZoom(format!(
            "The requested resolution {} is finer than the source resolution {}",
            record.target_resolution_deg, source_resolution
        )));
    }

    if record.zoom_level < record.min_zoom_level {
        return Err(ExportError::InvalidZoom(format!(
            "The requested zoom level {} is below the minimum zoom level {}",
            record.zoom_level, record.min_zoom_level
        )));
    }

    Ok(())
}

/// Validate every record against the layer's zoom band and footprint,
/// populating each record's sanitized box.
///
/// Validation is eager: records are processed in input order and the first
/// violation aborts the request. Re-validating an already sanitized record
/// yields the same box.
pub fn validate_features(
    records: &mut [GeometryRecord],
    footprint: &Geometry,
    max_zoom: u8,
    source_resolution: f64,
) -> ExportResult<()> {
    for record in records.iter_mut() {
        validate_zoom(record, max_zoom, source_resolution)?;

        let bbox = intersection_bbox(&record.geometry, footprint).ok_or_else(|| {
            ExportError::NoIntersection(
                serde_json::to_string(&record.geometry).unwrap_or_default(),
            )
        })?;
        let sanitized = snap_bbox_to_grid(&bbox, record.zoom_level);
        debug!(
            zoom = record.zoom_level,
            ?sanitized,
            "Sanitized feature bounding box"
        );
        record.sanitized_box = Some(sanitized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::parse_feature_collection;
    use export_common::{BoundingBox, Feature, FeatureCollection, FeatureProperties};

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![vec![
                [min_x, min_y],
                [max_x, min_y],
                [max_x, max_y],
                [min_x, max_y],
                [min_x, min_y],
            ]],
        }
    }

    fn record(zoom_level: u8, min_zoom_level: u8) -> GeometryRecord {
        GeometryRecord {
            geometry: square(0.0, 0.0, 1.0, 1.0),
            target_resolution_deg: 0.1,
            target_resolution_meter: 0.1,
            min_resolution_deg: 0.01,
            zoom_level,
            min_zoom_level,
            sanitized_box: None,
        }
    }

    #[test]
    fn test_zoom_exceeding_source_fails() {
        let result = validate_zoom(&record(12, 1), 10, 0.05);
        assert!(matches!(result, Err(ExportError::InvalidZoom(_))));
    }

    #[test]
    fn test_zoom_within_bounds_passes() {
        assert!(validate_zoom(&record(5, 3), 10, 0.05).is_ok());
    }

    #[test]
    fn test_inverted_zoom_band_fails() {
        let result = validate_zoom(&record(5, 8), 10, 0.05);
        assert!(matches!(result, Err(ExportError::InvalidZoom(_))));
    }

    #[test]
    fn test_validate_features_sanitizes_in_place() {
        let roi = FeatureCollection::of(Feature::new(
            square(10.0, 10.0, 20.0, 20.0),
            Some(FeatureProperties::with_max_resolution(0.17578125)),
        ));
        let mut records = parse_feature_collection(&roi).unwrap();
        let footprint = square(0.0, 0.0, 15.0, 15.0);

        validate_features(&mut records, &footprint, 4, 0.0439453125).unwrap();

        // Intersection is (10,10)-(15,15); zoom 2 tiles span 90x45 degrees.
        let sanitized = records[0].sanitized_box.unwrap();
        assert_eq!(sanitized, BoundingBox::new(0.0, 0.0, 90.0, 45.0));

        // Idempotent: validating again yields the same box.
        validate_features(&mut records, &footprint, 4, 0.0439453125).unwrap();
        assert_eq!(records[0].sanitized_box.unwrap(), sanitized);
    }

    #[test]
    fn test_validate_features_no_intersection() {
        let roi = FeatureCollection::of(Feature::new(
            square(50.0, 50.0, 60.0, 60.0),
            Some(FeatureProperties::with_max_resolution(0.703125)),
        ));
        let mut records = parse_feature_collection(&roi).unwrap();
        let footprint = square(0.0, 0.0, 10.0, 10.0);

        let result = validate_features(&mut records, &footprint, 10, 0.703125);
        assert!(matches!(result, Err(ExportError::NoIntersection(_))));
    }

    #[test]
    fn test_validate_features_fails_on_first_violation() {
        let roi = FeatureCollection::new(vec![
            Feature::new(
                square(50.0, 50.0, 60.0, 60.0),
                Some(FeatureProperties::with_max_resolution(0.703125)),
            ),
            Feature::new(
                square(0.0, 0.0, 5.0, 5.0),
                Some(FeatureProperties::with_max_resolution(0.703125)),
            ),
        ]);
        let mut records = parse_feature_collection(&roi).unwrap();
        let footprint = square(0.0, 0.0, 10.0, 10.0);

        // First record misses the footprint; the second is never sanitized.
        let result = validate_features(&mut records, &footprint, 10, 0.703125);
        assert!(result.is_err());
        assert!(records[1].sanitized_box.is_none());
    }
}
