//! Core domain types for the OpenBounds build pipeline.
//!
//! Responsibilities:
//! - Model source descriptors, artefacts and the catalog as GeoJSON.
//! - Evaluate descriptor filters against feature properties.
//! - Resolve filetype tags to reader adapters.
//! - Derive geometry summaries (bounds, demo points, label points).
//!
//! Boundaries:
//! - No network or filesystem access; see `openbounds-data` for the pipeline.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod artifact;
pub mod catalog;
pub mod descriptor;
pub mod filter;
pub mod geojson;
pub mod summary;

pub use adapter::{AdapterError, AdapterRegistry, ReadRequest, SourceAdapter, UnknownFiletype};
pub use artifact::{Artifact, DEMO_KEY, FEATURE_COUNT_KEY, SOURCE_URL_KEY};
pub use catalog::{CATALOG_FILE_NAME, CatalogBuilder, PATH_KEY, catalog_entry};
pub use descriptor::{DescriptorError, EXCLUDED_KEYS, SourceDescriptor};
pub use filter::{ComparisonOp, FilterClause, FilterExpression, FilterOperator};
pub use geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
pub use summary::Bounds;
