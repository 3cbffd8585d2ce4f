//! Catalog assembly: one summary feature per processed source.

use log::debug;
use serde_json::Value;

use crate::artifact::{Artifact, DEMO_KEY, geometry_value};
use crate::geojson::{Feature, FeatureCollection};
use crate::summary;

/// Fixed file name of the catalog at the output root.
pub const CATALOG_FILE_NAME: &str = "catalog.geojson";
/// Catalog entry property holding the artefact's path relative to the output root.
pub const PATH_KEY: &str = "path";

/// Ordered accumulator for catalog entries.
///
/// Entries keep insertion order, which follows descriptor enumeration.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<Feature>,
}

impl CatalogBuilder {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entry for `artifact`, stored at `relative_path` under the output root.
    pub fn push(&mut self, artifact: &Artifact, relative_path: &str) {
        self.entries.push(catalog_entry(artifact, relative_path));
    }

    /// Number of entries so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finish the catalog as a feature collection.
    pub fn finish(self) -> FeatureCollection {
        FeatureCollection::new(self.entries)
    }
}

/// Build the catalog feature describing one artefact.
///
/// Artefacts written before `demo` existed get one computed here; the
/// artefact file itself is left untouched.
pub fn catalog_entry(artifact: &Artifact, relative_path: &str) -> Feature {
    let mut properties = artifact.properties();
    if !artifact.has_demo() {
        debug!("back-filling demo point for {relative_path}");
        if let Some(demo) = summary::demo_point(&artifact.collection().features) {
            properties.insert(DEMO_KEY.to_owned(), geometry_value(&demo));
        }
    }
    properties.insert(
        PATH_KEY.to_owned(),
        Value::String(relative_path.to_owned()),
    );
    let geometry = summary::summary_geometry(&artifact.collection().features, artifact.bounds());
    Feature::new(geometry, properties)
}
