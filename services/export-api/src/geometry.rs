//! Planar and geodesic geometry predicates for export regions.
//!
//! The admission engine needs exactly four geometric capabilities: the
//! bounding box of a polygon/footprint intersection, geodesic polygon area,
//! polygon containment, and containment with a metric tolerance. All are
//! built from two planar primitives (point-in-ring and segment
//! intersection) over EPSG:4326 coordinates.

use tracing::debug;

use export_common::geojson::{Position, Ring};
use export_common::{BoundingBox, FeatureCollection, Geometry};

use crate::config::RoiSimilarityConfig;

/// WGS84 equatorial radius in meters.
const EARTH_RADIUS_METERS: f64 = 6378137.0;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

/// Planar tolerance in degrees for on-boundary checks (~0.1 mm).
const BOUNDARY_EPS_DEG: f64 = 1e-9;

/// Parameter tolerance for segment intersection tests.
const PARAM_EPS: f64 = 1e-9;

fn edge_indices(ring: &Ring) -> impl Iterator<Item = (usize, usize)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (i, (i + 1) % n)).filter(move |(i, j)| {
        let a = ring[*i];
        let b = ring[*j];
        a[0] != b[0] || a[1] != b[1]
    })
}

/// Planar distance (in degrees) from a point to a segment.
fn point_segment_distance_deg(p: Position, a: Position, b: Position) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len2).clamp(0.0, 1.0)
    };
    let cx = a[0] + t * dx - p[0];
    let cy = a[1] + t * dy - p[1];
    (cx * cx + cy * cy).sqrt()
}

/// Check if a point lies on a ring's boundary.
fn point_on_ring(p: Position, ring: &Ring) -> bool {
    edge_indices(ring).any(|(i, j)| point_segment_distance_deg(p, ring[i], ring[j]) <= BOUNDARY_EPS_DEG)
}

/// Ray-casting point-in-ring test, exclusive of the boundary.
fn point_in_ring_interior(p: Position, ring: &Ring) -> bool {
    let mut inside = false;
    for (i, j) in edge_indices(ring) {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);
        if (yi > p[1]) != (yj > p[1]) && p[0] < (xj - xi) * (p[1] - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }
    inside
}

/// Boundary-inclusive point-in-polygon test over a ring set
/// (exterior ring first, then holes).
fn point_in_polygon(p: Position, rings: &[Ring]) -> bool {
    let Some(exterior) = rings.first() else {
        return false;
    };
    if point_on_ring(p, exterior) {
        return true;
    }
    if !point_in_ring_interior(p, exterior) {
        return false;
    }
    for hole in &rings[1..] {
        if point_in_ring_interior(p, hole) && !point_on_ring(p, hole) {
            return false;
        }
    }
    true
}

/// Intersection point of two segments, when they cross within their extents.
/// Collinear overlaps return `None`; their extremes are segment endpoints and
/// are picked up by the vertex tests instead.
fn segment_intersection(
    p1: Position,
    p2: Position,
    p3: Position,
    p4: Position,
) -> Option<Position> {
    let d1x = p2[0] - p1[0];
    let d1y = p2[1] - p1[1];
    let d2x = p4[0] - p3[0];
    let d2y = p4[1] - p3[1];

    let denom = d1x * d2y - d1y * d2x;
    if denom.abs() < 1e-15 {
        return None;
    }

    let t = ((p3[0] - p1[0]) * d2y - (p3[1] - p1[1]) * d2x) / denom;
    let u = ((p3[0] - p1[0]) * d1y - (p3[1] - p1[1]) * d1x) / denom;
    if (-PARAM_EPS..=1.0 + PARAM_EPS).contains(&t) && (-PARAM_EPS..=1.0 + PARAM_EPS).contains(&u) {
        Some([p1[0] + t * d1x, p1[1] + t * d1y])
    } else {
        None
    }
}

/// Whether two segments cross through each other's interior.
fn segments_cross_interior(p1: Position, p2: Position, p3: Position, p4: Position) -> bool {
    let d1x = p2[0] - p1[0];
    let d1y = p2[1] - p1[1];
    let d2x = p4[0] - p3[0];
    let d2y = p4[1] - p3[1];

    let denom = d1x * d2y - d1y * d2x;
    if denom.abs() < 1e-15 {
        return false;
    }

    let t = ((p3[0] - p1[0]) * d2y - (p3[1] - p1[1]) * d2x) / denom;
    let u = ((p3[0] - p1[0]) * d1y - (p3[1] - p1[1]) * d1x) / denom;
    t > PARAM_EPS && t < 1.0 - PARAM_EPS && u > PARAM_EPS && u < 1.0 - PARAM_EPS
}

/// Bounding box of the intersection region of two geometries.
///
/// The extremes of a polygon intersection lie on subject vertices inside the
/// clip region, clip vertices inside the subject region, or edge crossings;
/// the box over those candidate points is the box of the intersection.
/// Returns `None` when the regions share no area.
pub fn intersection_bbox(subject: &Geometry, clip: &Geometry) -> Option<BoundingBox> {
    // Regions whose bounding boxes share no area cannot intersect.
    subject.bbox()?.intersection(&clip.bbox()?)?;

    let mut points: Vec<(f64, f64)> = Vec::new();

    for subject_rings in subject.polygons() {
        for clip_rings in clip.polygons() {
            for p in subject_rings.iter().flatten() {
                if point_in_polygon(*p, clip_rings) {
                    points.push((p[0], p[1]));
                }
            }
            for p in clip_rings.iter().flatten() {
                if point_in_polygon(*p, subject_rings) {
                    points.push((p[0], p[1]));
                }
            }
            for subject_ring in subject_rings {
                for clip_ring in clip_rings {
                    for (si, sj) in edge_indices(subject_ring) {
                        for (ci, cj) in edge_indices(clip_ring) {
                            if let Some(p) = segment_intersection(
                                subject_ring[si],
                                subject_ring[sj],
                                clip_ring[ci],
                                clip_ring[cj],
                            ) {
                                points.push((p[0], p[1]));
                            }
                        }
                    }
                }
            }
        }
    }

    let bbox = BoundingBox::from_points(points)?;
    // A shared point or edge is not an area intersection.
    if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
        return None;
    }
    Some(bbox)
}

/// Signed spherical-excess area of a ring in square meters.
fn ring_area_sq_meters(ring: &Ring) -> f64 {
    // Drop the closing point so the wrap-around indexing sees each vertex once.
    let points = match ring.as_slice() {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        points => points,
    };
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let lower = points[i];
        let middle = points[(i + 1) % n];
        let upper = points[(i + 2) % n];
        total += (upper[0].to_radians() - lower[0].to_radians()) * middle[1].to_radians().sin();
    }
    total * EARTH_RADIUS_METERS * EARTH_RADIUS_METERS / 2.0
}

/// Geodesic area of a polygon (exterior minus holes) in square meters.
pub fn polygon_area_sq_meters(rings: &[Ring]) -> f64 {
    let Some(exterior) = rings.first() else {
        return 0.0;
    };
    let mut area = ring_area_sq_meters(exterior).abs();
    for hole in &rings[1..] {
        area -= ring_area_sq_meters(hole).abs();
    }
    area.max(0.0)
}

/// Distance in meters from a point to the nearest boundary of a ring set,
/// through the local equirectangular metric at the point's latitude.
fn distance_to_boundary_meters(p: Position, rings: &[Ring]) -> f64 {
    let mx = METERS_PER_DEGREE * p[1].to_radians().cos();
    let my = METERS_PER_DEGREE;

    let mut best = f64::INFINITY;
    for ring in rings {
        for (i, j) in edge_indices(ring) {
            let a = ring[i];
            let b = ring[j];
            let ax = (a[0] - p[0]) * mx;
            let ay = (a[1] - p[1]) * my;
            let bx = (b[0] - p[0]) * mx;
            let by = (b[1] - p[1]) * my;

            let dx = bx - ax;
            let dy = by - ay;
            let len2 = dx * dx + dy * dy;
            let t = if len2 == 0.0 {
                0.0
            } else {
                (-(ax * dx + ay * dy) / len2).clamp(0.0, 1.0)
            };
            let cx = ax + t * dx;
            let cy = ay + t * dy;
            best = best.min((cx * cx + cy * cy).sqrt());
        }
    }
    best
}

/// Exact polygon containment: every vertex of `inner` lies in `outer`
/// (boundary included) and no edges cross through each other.
pub fn polygon_contains(outer: &[Ring], inner: &[Ring]) -> bool {
    for p in inner.iter().flatten() {
        if !point_in_polygon(*p, outer) {
            return false;
        }
    }
    for inner_ring in inner {
        for outer_ring in outer {
            for (ii, ij) in edge_indices(inner_ring) {
                for (oi, oj) in edge_indices(outer_ring) {
                    if segments_cross_interior(
                        inner_ring[ii],
                        inner_ring[ij],
                        outer_ring[oi],
                        outer_ring[oj],
                    ) {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Containment with a metric tolerance: every vertex of `inner` lies in
/// `outer` or within `buffer_meters` of its boundary.
pub fn polygon_contains_buffered(outer: &[Ring], inner: &[Ring], buffer_meters: f64) -> bool {
    inner.iter().flatten().all(|p| {
        point_in_polygon(*p, outer) || distance_to_boundary_meters(*p, outer) <= buffer_meters
    })
}

/// Decide whether an export request's region is "the same request" as a
/// stored job's region.
///
/// Collections that are not both a single Polygon feature compare by exact
/// structural equality. Single-polygon pairs compare by tolerant,
/// asymmetric containment: the export region must sit inside the
/// (buffered) job region and cover enough of its area.
pub fn is_similar_roi(
    job_roi: &FeatureCollection,
    export_roi: &FeatureCollection,
    similarity: &RoiSimilarityConfig,
) -> bool {
    let (Some(job_polygon), Some(export_polygon)) =
        (job_roi.single_polygon(), export_roi.single_polygon())
    else {
        debug!("Not a single-polygon pair, comparing feature collections structurally");
        return job_roi == export_roi;
    };

    let contained = polygon_contains_buffered(job_polygon, export_polygon, similarity.roi_buffer_meter)
        || polygon_contains(job_polygon, export_polygon);
    if !contained {
        debug!("Export region is not contained within the buffered job region");
        return false;
    }

    let export_area = polygon_area_sq_meters(export_polygon);
    let job_area = polygon_area_sq_meters(job_polygon);
    let contained_percentage = export_area / job_area * 100.0;
    contained_percentage >= similarity.min_contained_percentage
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_common::{Feature, FeatureProperties};

    fn square_ring(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Ring {
        vec![
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y],
        ]
    }

    fn square_polygon(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![square_ring(min_x, min_y, max_x, max_y)],
        }
    }

    fn single_polygon_roi(geometry: Geometry) -> FeatureCollection {
        FeatureCollection::of(Feature::new(
            geometry,
            Some(FeatureProperties::with_max_resolution(0.703125)),
        ))
    }

    #[test]
    fn test_point_in_polygon_boundary_inclusive() {
        let rings = vec![square_ring(0.0, 0.0, 10.0, 10.0)];
        assert!(point_in_polygon([5.0, 5.0], &rings));
        assert!(point_in_polygon([0.0, 5.0], &rings));
        assert!(point_in_polygon([0.0, 0.0], &rings));
        assert!(!point_in_polygon([10.1, 5.0], &rings));
    }

    #[test]
    fn test_point_in_polygon_respects_holes() {
        let rings = vec![
            square_ring(0.0, 0.0, 10.0, 10.0),
            square_ring(4.0, 4.0, 6.0, 6.0),
        ];
        assert!(point_in_polygon([1.0, 1.0], &rings));
        assert!(!point_in_polygon([5.0, 5.0], &rings));
        // Hole boundary still belongs to the region.
        assert!(point_in_polygon([4.0, 5.0], &rings));
    }

    #[test]
    fn test_intersection_bbox_overlap() {
        let a = square_polygon(0.0, 0.0, 10.0, 10.0);
        let b = square_polygon(5.0, 5.0, 15.0, 15.0);
        let bbox = intersection_bbox(&a, &b).unwrap();
        assert_eq!(bbox, BoundingBox::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_intersection_bbox_contained() {
        let outer = square_polygon(0.0, 0.0, 10.0, 10.0);
        let inner = square_polygon(2.0, 3.0, 4.0, 5.0);
        assert_eq!(
            intersection_bbox(&inner, &outer).unwrap(),
            BoundingBox::new(2.0, 3.0, 4.0, 5.0)
        );
        assert_eq!(
            intersection_bbox(&outer, &inner).unwrap(),
            BoundingBox::new(2.0, 3.0, 4.0, 5.0)
        );
    }

    #[test]
    fn test_intersection_bbox_crossing_shapes() {
        // A plus-shaped overlap: neither polygon contains the other's
        // vertices, all extremes come from edge crossings.
        let horizontal = square_polygon(0.0, 4.0, 10.0, 6.0);
        let vertical = square_polygon(4.0, 0.0, 6.0, 10.0);
        let bbox = intersection_bbox(&horizontal, &vertical).unwrap();
        assert_eq!(bbox, BoundingBox::new(4.0, 4.0, 6.0, 6.0));
    }

    #[test]
    fn test_intersection_bbox_disjoint_and_touching() {
        let a = square_polygon(0.0, 0.0, 1.0, 1.0);
        let b = square_polygon(5.0, 5.0, 6.0, 6.0);
        assert!(intersection_bbox(&a, &b).is_none());

        // Sharing only an edge is not an area intersection.
        let c = square_polygon(1.0, 0.0, 2.0, 1.0);
        assert!(intersection_bbox(&a, &c).is_none());
    }

    #[test]
    fn test_polygon_area() {
        // One square degree at the equator is about 12,364 km^2.
        let rings = vec![square_ring(0.0, 0.0, 1.0, 1.0)];
        let area = polygon_area_sq_meters(&rings);
        assert!((area - 1.2392e10).abs() / 1.2392e10 < 0.01, "area = {}", area);

        // A hole subtracts from the exterior.
        let holed = vec![
            square_ring(0.0, 0.0, 1.0, 1.0),
            square_ring(0.25, 0.25, 0.75, 0.75),
        ];
        let holed_area = polygon_area_sq_meters(&holed);
        assert!(holed_area < area);
        assert!((holed_area / area - 0.75).abs() < 0.01);
    }

    #[test]
    fn test_polygon_contains() {
        let outer = vec![square_ring(0.0, 0.0, 10.0, 10.0)];
        let inner = vec![square_ring(2.0, 2.0, 8.0, 8.0)];
        let crossing = vec![square_ring(5.0, 5.0, 15.0, 15.0)];

        assert!(polygon_contains(&outer, &inner));
        assert!(!polygon_contains(&outer, &crossing));
        assert!(!polygon_contains(&inner, &outer));
        // A polygon contains itself; shared boundaries are allowed.
        assert!(polygon_contains(&outer, &outer));
    }

    #[test]
    fn test_polygon_contains_buffered() {
        let job = vec![square_ring(34.85, 32.29, 34.86, 32.30)];
        // Sticks out ~2 meters past the job polygon's edge.
        let two_meters_deg = 2.0 / METERS_PER_DEGREE;
        let near = vec![square_ring(34.85, 32.29, 34.86 + two_meters_deg, 32.30)];
        // Sticks out ~200 meters.
        let far = vec![square_ring(34.85, 32.29, 34.86 + 100.0 * two_meters_deg, 32.30)];

        assert!(polygon_contains_buffered(&job, &near, 5.0));
        assert!(!polygon_contains_buffered(&job, &far, 5.0));
    }

    #[test]
    fn test_similarity_is_reflexive() {
        let similarity = RoiSimilarityConfig::default();

        let single = single_polygon_roi(square_polygon(34.85, 32.29, 34.86, 32.30));
        assert!(is_similar_roi(&single, &single, &similarity));

        let multi = FeatureCollection::new(vec![
            Feature::new(square_polygon(0.0, 0.0, 1.0, 1.0), None),
            Feature::new(square_polygon(2.0, 2.0, 3.0, 3.0), None),
        ]);
        assert!(is_similar_roi(&multi, &multi, &similarity));
    }

    #[test]
    fn test_similarity_area_threshold() {
        let similarity = RoiSimilarityConfig::default();
        let job = single_polygon_roi(square_polygon(0.0, 0.0, 1.0, 1.0));

        // Contained but only half the area: not similar at 75%.
        let half = single_polygon_roi(square_polygon(0.0, 0.0, 1.0, 0.5));
        assert!(!is_similar_roi(&job, &half, &similarity));

        // Contained and ~90% of the area: similar.
        let most = single_polygon_roi(square_polygon(0.0, 0.0, 1.0, 0.9));
        assert!(is_similar_roi(&job, &most, &similarity));

        // Similarity is asymmetric: the larger region is not "inside" the
        // smaller one.
        assert!(!is_similar_roi(&most, &job, &similarity));
    }

    #[test]
    fn test_similarity_multi_feature_falls_back_to_equality() {
        let similarity = RoiSimilarityConfig::default();
        let a = FeatureCollection::new(vec![
            Feature::new(square_polygon(0.0, 0.0, 1.0, 1.0), None),
            Feature::new(square_polygon(2.0, 2.0, 3.0, 3.0), None),
        ]);
        let mut b = a.clone();
        assert!(is_similar_roi(&a, &b, &similarity));

        // Same features in a different order are not the same request.
        b.features.reverse();
        assert!(!is_similar_roi(&a, &b, &similarity));
    }
}
