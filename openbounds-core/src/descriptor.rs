//! Source descriptors: persisted records describing one remote source.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::filter::{FilterClause, FilterExpression, FilterOperator};
use crate::geojson::Properties;

/// Descriptor keys that control processing and never reach artefact properties.
pub const EXCLUDED_KEYS: [&str; 5] = ["filetype", "url", "properties", "filter", "filenameInZip"];

/// A source descriptor as stored on disk.
///
/// Keys not modelled explicitly are kept in [`SourceDescriptor::extra`] and
/// flow into the artefact's properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Location of the raw source file.
    pub url: String,
    /// Adapter tag used to read the raw file.
    pub filetype: String,
    /// Adapter-specific settings, passed through opaquely.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Optional flat filter applied to every feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<FilterClause>>,
    /// Combinator for [`SourceDescriptor::filter`]; `and` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_operator: Option<FilterOperator>,
    /// Layer selector for multi-layer sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
    /// Entry selector for zipped sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_in_zip: Option<String>,
    /// Every other descriptor field.
    #[serde(flatten)]
    pub extra: Properties,
}

/// Errors raised while decoding a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor bytes could not be read.
    #[error("failed to read descriptor: {0}")]
    Read(#[source] std::io::Error),
    /// The descriptor was not a valid descriptor object.
    #[error("failed to parse descriptor: {0}")]
    Parse(#[source] serde_json::Error),
}

impl SourceDescriptor {
    /// Decode a descriptor from a JSON reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, DescriptorError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(DescriptorError::Read)?;
        serde_json::from_slice(&raw).map_err(DescriptorError::Parse)
    }

    /// Combinator to use when evaluating the filter.
    pub fn operator(&self) -> FilterOperator {
        self.filter_operator.unwrap_or_default()
    }

    /// Build the filter for this source, if it declares a non-empty one.
    pub fn filter_expression(&self) -> Option<FilterExpression> {
        let clauses = self.filter.as_ref().filter(|clauses| !clauses.is_empty())?;
        Some(FilterExpression::new(clauses.clone(), self.operator()))
    }

    /// Final path segment of the source URL, used for diagnostics and temp names.
    pub fn url_file_name(&self) -> Option<&str> {
        let without_query = self.url.split(['?', '#']).next().unwrap_or_default();
        without_query
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }

    /// Descriptor fields that are copied onto the artefact.
    ///
    /// Control keys listed in [`EXCLUDED_KEYS`] are dropped; everything else,
    /// including `layerName` and `filterOperator`, is kept.
    pub fn descriptor_properties(&self) -> Properties {
        let mut properties = self.extra.clone();
        if let Some(layer) = &self.layer_name {
            properties.insert("layerName".to_owned(), Value::String(layer.clone()));
        }
        if let Some(operator) = self.filter_operator {
            properties.insert(
                "filterOperator".to_owned(),
                Value::String(operator.as_str().to_owned()),
            );
        }
        properties.retain(|key, _| !EXCLUDED_KEYS.contains(&key.as_str()));
        properties
    }
}
