//! Per-source conversion from descriptor to written artefact.
//!
//! [`SourceProcessor::process`] never propagates a failure past itself: every
//! outcome, including a panicking adapter, comes back as a
//! [`SourceFailure`] for the batch to record.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use openbounds_core::{AdapterRegistry, Artifact, ReadRequest, SourceDescriptor};
use thiserror::Error;

use crate::cleaner;
use crate::fetch::ResourceFetcher;
use crate::output::{self, ArtifactLocation};
use crate::report::{BatchEvent, Reporter};

/// Category of a per-source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The filetype tag has no registered adapter.
    UnknownFormat,
    /// The descriptor file could not be read or decoded.
    InvalidDescriptor,
    /// The remote resource could not be acquired.
    FetchFailed,
    /// The adapter could not read the resource, including corrupt archives.
    ReadFailed,
    /// The adapter returned no features.
    EmptyResult,
    /// Anything else, including adapter panics and output I/O errors.
    UnexpectedFailure,
}

impl FailureKind {
    /// Stable name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownFormat => "UnknownFormat",
            Self::InvalidDescriptor => "InvalidDescriptor",
            Self::FetchFailed => "FetchFailed",
            Self::ReadFailed => "ReadFailed",
            Self::EmptyResult => "EmptyResult",
            Self::UnexpectedFailure => "UnexpectedFailure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, source-scoped failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SourceFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl SourceFailure {
    /// Build a failure of `kind` described by `message`.
    pub fn new(kind: FailureKind, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

/// Fetches, reads, filters and writes one source.
#[derive(Clone, Copy)]
pub struct SourceProcessor<'a> {
    registry: &'a AdapterRegistry,
    fetcher: &'a dyn ResourceFetcher,
    reporter: &'a dyn Reporter,
}

impl fmt::Debug for SourceProcessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceProcessor")
            .field("registry", self.registry)
            .finish_non_exhaustive()
    }
}

impl<'a> SourceProcessor<'a> {
    /// Wire a processor to its collaborators.
    pub fn new(
        registry: &'a AdapterRegistry,
        fetcher: &'a dyn ResourceFetcher,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            registry,
            fetcher,
            reporter,
        }
    }

    /// Regenerate the artefact for `descriptor` at `location`.
    ///
    /// On success the artefact and its label points are on disk and stale
    /// byproducts sharing the base name are gone. On failure nothing new has
    /// been written.
    pub fn process(
        &self,
        descriptor: &SourceDescriptor,
        location: &ArtifactLocation,
    ) -> Result<Artifact, SourceFailure> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run(descriptor, location))).unwrap_or_else(
            |payload| {
                Err(SourceFailure::new(
                    FailureKind::UnexpectedFailure,
                    format_args!("panicked: {}", panic_message(payload.as_ref())),
                ))
            },
        )
    }

    fn run(
        &self,
        descriptor: &SourceDescriptor,
        location: &ArtifactLocation,
    ) -> Result<Artifact, SourceFailure> {
        let adapter = self
            .registry
            .lookup(&descriptor.filetype)
            .map_err(|err| SourceFailure::new(FailureKind::UnknownFormat, err))?;

        self.reporter.report(&BatchEvent::Downloading {
            url: descriptor.url.clone(),
        });
        let resource = self
            .fetcher
            .fetch(&descriptor.url)
            .map_err(|err| SourceFailure::new(FailureKind::FetchFailed, err))?;

        let filter = descriptor.filter_expression();
        let request = ReadRequest {
            path: resource.path(),
            properties: &descriptor.properties,
            filter: filter.as_ref(),
            layer_name: descriptor.layer_name.as_deref(),
            filename_in_zip: descriptor.filename_in_zip.as_deref(),
        };
        let read = adapter.read(&request);
        drop(resource);
        let collection = read.map_err(|err| SourceFailure::new(FailureKind::ReadFailed, err))?;
        if collection.is_empty() {
            return Err(SourceFailure::new(
                FailureKind::EmptyResult,
                format_args!("no features read from {}", descriptor.url),
            ));
        }

        let artifact = Artifact::build(collection, descriptor);
        self.write(&artifact, location)
            .map_err(|err| SourceFailure::new(FailureKind::UnexpectedFailure, err))?;
        self.reporter.report(&BatchEvent::Written {
            artifact: location.artifact.clone(),
            feature_count: artifact.feature_count(),
        });
        Ok(artifact)
    }

    fn write(&self, artifact: &Artifact, location: &ArtifactLocation) -> std::io::Result<()> {
        let dir = location.dir();
        openbounds_fs::ensure_dir(dir)?;
        for path in cleaner::remove_stale(dir, location.base_name(), &location.source_dir)? {
            self.reporter.report(&BatchEvent::Removed { path });
        }
        write_outputs(artifact, location)
    }
}

/// Write the label points, then the artefact.
///
/// The artefact is what marks a source as fresh, so it lands last; if it
/// cannot be written the labels are removed again.
fn write_outputs(artifact: &Artifact, location: &ArtifactLocation) -> std::io::Result<()> {
    let labels = location.labels();
    output::write_json_atomic(&labels, &artifact.label_points())?;
    output::write_json_atomic(&location.artifact, artifact).inspect_err(|_| {
        if let Err(err) = openbounds_fs::remove_path(&labels) {
            log::warn!("failed to remove {labels} after a failed write: {err}");
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
