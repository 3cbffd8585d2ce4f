//! Error types emitted by the OpenBounds CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use openbounds_data::{BatchError, FetcherBuildError, TilingError};
use thiserror::Error;

/// Errors emitted by the OpenBounds CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The output directory does not exist or is not a directory.
    #[error("output directory {path:?} is not a directory")]
    OutputDirectoryNotDirectory { path: Utf8PathBuf },
    /// Tiling was requested with both a catalog and explicit sources.
    #[error("pass either --catalog or source paths, not both")]
    ConflictingTilingSources,
    /// The HTTP fetcher could not be constructed.
    #[error("failed to build HTTP fetcher: {0}")]
    Fetcher(#[from] FetcherBuildError),
    /// The batch stopped before visiting every descriptor.
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// The batch finished but some sources failed.
    #[error("{count} source(s) failed")]
    BatchFailed { count: usize },
    /// Vector tiling failed.
    #[error(transparent)]
    Tiling(#[from] TilingError),
}
