//! Minimal GeoJSON document model used for artefacts and the catalog.
//!
//! Only the subset needed by the pipeline is modelled: features with optional
//! geometries, feature collections with a foreign `properties` member, and the
//! six coordinate-carrying geometry types. `GeometryCollection` is not
//! supported and fails to decode.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Property mapping attached to features, artefacts and catalog entries.
pub type Properties = Map<String, Value>;

/// A single coordinate tuple (`[x, y]` or `[x, y, z]`).
pub type Position = Vec<f64>;

/// Marker for the fixed `"type": "Feature"` member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    /// The only admissible value.
    #[default]
    Feature,
}

/// Marker for the fixed `"type": "FeatureCollection"` member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionTag {
    /// The only admissible value.
    #[default]
    FeatureCollection,
}

/// GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// A single position.
    Point(Position),
    /// Several unconnected positions.
    MultiPoint(Vec<Position>),
    /// A connected line.
    LineString(Vec<Position>),
    /// Several lines.
    MultiLineString(Vec<Vec<Position>>),
    /// Exterior ring followed by interior rings.
    Polygon(Vec<Vec<Position>>),
    /// Several polygons.
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

/// GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    kind: FeatureTag,
    /// Optional feature identifier, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Feature geometry; `null` geometries are allowed.
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Feature attributes; a `null` member decodes as an empty mapping.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
}

impl Feature {
    /// Construct a feature from a geometry and its properties.
    pub fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            kind: FeatureTag::Feature,
            id: None,
            geometry,
            properties,
        }
    }
}

/// GeoJSON feature collection with the foreign members used by artefacts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    kind: CollectionTag,
    /// Bounding box as `[min_x, min_y, max_x, max_y]` (or the 3D form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    /// Ordered features.
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Collection-level properties; present on artefacts, absent on the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

impl FeatureCollection {
    /// Construct a collection from its features.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionTag::FeatureCollection,
            bbox: None,
            features,
            properties: None,
        }
    }

    /// Number of features in the collection.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Properties>::deserialize(deserializer).map(Option::unwrap_or_default)
}
