//! GeoJSON types for export regions of interest.
//!
//! Only the geometry kinds an export request may carry are modeled
//! (Polygon and MultiPolygon). Feature properties hold the per-feature
//! resolution hints that drive zoom selection.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// A GeoJSON position as `[longitude, latitude]`.
pub type Position = [f64; 2];

/// A linear ring: a closed sequence of positions.
pub type Ring = Vec<Position>;

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    /// Array of features, in request order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create a collection from a list of features.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features,
        }
    }

    /// Wrap a single feature.
    pub fn of(feature: Feature) -> Self {
        Self::new(vec![feature])
    }

    /// The rings of the single Polygon feature, when the collection holds
    /// exactly one Polygon and nothing else.
    pub fn single_polygon(&self) -> Option<&Vec<Ring>> {
        match self.features.as_slice() {
            [feature] => match &feature.geometry {
                Geometry::Polygon { coordinates } => Some(coordinates),
                Geometry::MultiPolygon { .. } => None,
            },
            _ => None,
        }
    }
}

/// A GeoJSON Feature carrying export resolution hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    /// The geometry of this feature.
    pub geometry: Geometry,

    /// Resolution hints; `null` when the caller supplied none.
    pub properties: Option<FeatureProperties>,

    /// Optional GeoJSON bbox member, carried through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

impl Feature {
    /// Create a new feature.
    pub fn new(geometry: Geometry, properties: Option<FeatureProperties>) -> Self {
        Self {
            type_: "Feature".to_string(),
            geometry,
            properties,
            bbox: None,
        }
    }
}

/// Per-feature export resolution hints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    /// Target resolution in degrees per pixel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resolution_deg: Option<f64>,

    /// Coarsest resolution to include, in degrees per pixel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_resolution_deg: Option<f64>,
}

impl FeatureProperties {
    /// Properties carrying only a target resolution.
    pub fn with_max_resolution(max_resolution_deg: f64) -> Self {
        Self {
            max_resolution_deg: Some(max_resolution_deg),
            min_resolution_deg: None,
        }
    }
}

/// GeoJSON geometry kinds an export region may use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A polygon: exterior ring followed by any interior rings (holes).
    Polygon { coordinates: Vec<Ring> },

    /// A multi-polygon: a list of polygons.
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

impl Geometry {
    /// Iterate over the constituent polygons (each a list of rings,
    /// exterior first), treating a Polygon as a one-element sequence.
    pub fn polygons(&self) -> impl Iterator<Item = &Vec<Ring>> {
        match self {
            Geometry::Polygon { coordinates } => std::slice::from_ref(coordinates).iter(),
            Geometry::MultiPolygon { coordinates } => coordinates.as_slice().iter(),
        }
    }

    /// Bounding box over all exterior and interior ring positions.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.polygons()
                .flatten()
                .flatten()
                .map(|p| (p[0], p[1])),
        )
    }
}
