//! Normalised per-source artefacts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::SourceDescriptor;
use crate::geojson::{FeatureCollection, Properties};
use crate::summary::{self, Bounds};

/// Artefact property holding the descriptor's source URL.
pub const SOURCE_URL_KEY: &str = "source_url";
/// Artefact property holding the number of features.
pub const FEATURE_COUNT_KEY: &str = "feature_count";
/// Artefact property holding the representative point.
pub const DEMO_KEY: &str = "demo";

/// A normalised feature collection for one source, with merged properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact {
    collection: FeatureCollection,
}

impl Artifact {
    /// Build an artefact from an adapter result and its descriptor.
    ///
    /// The collection-level properties become the descriptor properties plus
    /// `source_url`, `feature_count` and `demo`. A missing `bbox` is computed
    /// from the features.
    pub fn build(mut collection: FeatureCollection, descriptor: &SourceDescriptor) -> Self {
        let mut properties = descriptor.descriptor_properties();
        properties.insert(
            SOURCE_URL_KEY.to_owned(),
            Value::String(descriptor.url.clone()),
        );
        properties.insert(
            FEATURE_COUNT_KEY.to_owned(),
            Value::from(collection.features.len()),
        );
        if let Some(demo) = summary::demo_point(&collection.features) {
            properties.insert(DEMO_KEY.to_owned(), geometry_value(&demo));
        }
        if collection
            .bbox
            .as_deref()
            .and_then(Bounds::from_bbox)
            .is_none()
        {
            collection.bbox = Bounds::of_features(&collection.features).map(Bounds::to_bbox);
        }
        collection.properties = Some(properties);
        Self { collection }
    }

    /// Wrap a collection read back from disk.
    pub fn from_collection(collection: FeatureCollection) -> Self {
        Self { collection }
    }

    /// Underlying feature collection.
    pub fn collection(&self) -> &FeatureCollection {
        &self.collection
    }

    /// Number of features.
    pub fn feature_count(&self) -> usize {
        self.collection.features.len()
    }

    /// Merged artefact properties (empty when none were stored).
    pub fn properties(&self) -> Properties {
        self.collection.properties.clone().unwrap_or_default()
    }

    /// Bounds stored on (or derivable from) the artefact.
    pub fn bounds(&self) -> Option<Bounds> {
        self.collection
            .bbox
            .as_deref()
            .and_then(Bounds::from_bbox)
            .or_else(|| Bounds::of_features(&self.collection.features))
    }

    /// Whether the stored properties already carry a demo point.
    pub fn has_demo(&self) -> bool {
        self.collection
            .properties
            .as_ref()
            .is_some_and(|properties| properties.contains_key(DEMO_KEY))
    }

    /// Label-point collection derived from the artefact's features.
    pub fn label_points(&self) -> FeatureCollection {
        summary::label_points(&self.collection)
    }
}

pub(crate) fn geometry_value(geometry: &crate::geojson::Geometry) -> Value {
    serde_json::to_value(geometry).unwrap_or(Value::Null)
}
