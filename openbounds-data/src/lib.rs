//! Build pipeline for OpenBounds source descriptors.
//!
//! Responsibilities:
//! - Fetch remote resources into scoped temporary files.
//! - Provide the built-in `geojson` adapter and the default registry.
//! - Decide artefact freshness, clean stale byproducts and write artefacts.
//! - Drive a batch over a descriptor tree and write the catalog.
//! - Assemble the vector-tile builder invocation.
//!
//! Boundaries:
//! - Domain types and geometry summaries live in `openbounds-core`.
//! - Progress is reported through an explicit [`Reporter`]; no global state.
//!
//! Invariants:
//! - A failure in one source never aborts the batch.
//! - Temporary downloads are released on every exit path.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod batch;
pub mod cleaner;
pub mod fetch;
pub mod freshness;
pub mod output;
pub mod processor;
pub mod report;
pub mod tiling;

#[doc(hidden)]
pub mod test_support;

pub use adapters::{GEOJSON_TAG, GeoJsonAdapter, default_registry};
pub use batch::{BatchDriver, BatchError, BatchResult, FailedSource};
pub use cleaner::{remove_stale, stale_artifacts};
pub use fetch::{
    DEFAULT_USER_AGENT, FetchedResource, FetcherBuildError, HttpFetcher, HttpFetcherConfig,
    ResourceFetcher, TransportError,
};
pub use freshness::{Decision, RegenerateReason, decide};
pub use processor::{FailureKind, SourceFailure, SourceProcessor};
pub use report::{BatchEvent, LogReporter, Reporter};
pub use tiling::{TilingError, TilingRequest, TilingSources};
