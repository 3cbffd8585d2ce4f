//! Facade crate for the OpenBounds build pipeline.
//!
//! This crate re-exports the core domain types and, behind the `pipeline`
//! feature, the batch driver and vector-tiling entry points.

#![forbid(unsafe_code)]

pub use openbounds_core::{
    AdapterError, AdapterRegistry, Artifact, CATALOG_FILE_NAME, CatalogBuilder, Feature,
    FeatureCollection, FilterExpression, Geometry, Properties, ReadRequest, SourceAdapter,
    SourceDescriptor,
};

#[cfg(feature = "pipeline")]
pub use openbounds_data::{
    BatchDriver, BatchError, BatchResult, FailureKind, HttpFetcher, LogReporter, Reporter,
    ResourceFetcher, SourceFailure, TilingRequest, TilingSources, default_registry,
};
