//! Batch driver: one pass over a descriptor tree.
//!
//! Descriptors are processed strictly in path order. Each ends either in the
//! catalog (fresh write or reuse) or in the failure list; the catalog is
//! rewritten in full once every descriptor has been visited.

use std::io::BufReader;
use std::panic::{self, AssertUnwindSafe};

use camino::{Utf8Path, Utf8PathBuf};
use openbounds_core::{AdapterRegistry, CATALOG_FILE_NAME, CatalogBuilder, SourceDescriptor};
use thiserror::Error;
use walkdir::WalkDir;

use crate::fetch::ResourceFetcher;
use crate::freshness::{self, Decision, RegenerateReason};
use crate::output::{self, ArtifactLocation};
use crate::processor::{FailureKind, SourceFailure, SourceProcessor};
use crate::report::{BatchEvent, Reporter};

const DESCRIPTOR_EXTENSION: &str = "json";

/// Conditions that stop the whole batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchError {
    /// The sources path does not exist.
    #[error("sources path {path} does not exist")]
    SourcesMissing {
        /// Requested sources path.
        path: Utf8PathBuf,
    },
    /// The output root is not an existing directory.
    #[error("output path {path} is not a directory")]
    OutputNotDirectory {
        /// Requested output path.
        path: Utf8PathBuf,
    },
    /// Walking the sources tree failed.
    #[error("failed to enumerate descriptors under {path}: {source}")]
    Enumerate {
        /// Sources root.
        path: Utf8PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
    /// A descriptor path is not valid UTF-8.
    #[error("descriptor path {path} is not valid UTF-8")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
    /// Filesystem metadata could not be read.
    #[error("failed to inspect {path}: {source}")]
    Inspect {
        /// Path being inspected.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The catalog could not be written.
    #[error("failed to write catalog {path}: {source}")]
    WriteCatalog {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A descriptor that ended the batch in failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSource {
    /// Descriptor path.
    pub descriptor: Utf8PathBuf,
    /// What went wrong.
    pub failure: SourceFailure,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Failed descriptors in processing order.
    pub failures: Vec<FailedSource>,
    /// Number of catalog entries written.
    pub catalog_entries: usize,
    /// Location of the catalog.
    pub catalog_path: Utf8PathBuf,
}

impl BatchResult {
    /// Whether every descriptor was processed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure kinds in processing order.
    pub fn failure_kinds(&self) -> Vec<FailureKind> {
        self.failures
            .iter()
            .map(|failed| failed.failure.kind)
            .collect()
    }
}

/// Drives freshness checks, processing and catalog assembly for a tree of
/// descriptors.
#[derive(Clone, Copy)]
pub struct BatchDriver<'a> {
    registry: &'a AdapterRegistry,
    processor: SourceProcessor<'a>,
    reporter: &'a dyn Reporter,
    force: bool,
}

impl std::fmt::Debug for BatchDriver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDriver")
            .field("processor", &self.processor)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

impl<'a> BatchDriver<'a> {
    /// Wire a driver to its collaborators.
    pub fn new(
        registry: &'a AdapterRegistry,
        fetcher: &'a dyn ResourceFetcher,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            registry,
            processor: SourceProcessor::new(registry, fetcher, reporter),
            reporter,
            force: false,
        }
    }

    /// Regenerate artefacts even when they are up to date.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Process every descriptor under `sources` into `output`.
    ///
    /// Per-source failures are collected in the result; only problems with
    /// the roots or the catalog write are returned as errors.
    pub fn run(&self, sources: &Utf8Path, output: &Utf8Path) -> Result<BatchResult, BatchError> {
        let output_is_dir =
            openbounds_fs::dir_is_dir(output).map_err(|source| BatchError::Inspect {
                path: output.to_owned(),
                source,
            })?;
        if !output_is_dir {
            return Err(BatchError::OutputNotDirectory {
                path: output.to_owned(),
            });
        }

        let mut catalog = CatalogBuilder::new();
        let mut failures = Vec::new();
        for descriptor in enumerate_descriptors(sources)? {
            let location = ArtifactLocation::mirror(sources, &descriptor, output);
            let handled = panic::catch_unwind(AssertUnwindSafe(|| {
                self.handle(&descriptor, &location, &mut catalog)
            }))
            .unwrap_or_else(|_| {
                Err(SourceFailure::new(
                    FailureKind::UnexpectedFailure,
                    "panicked while processing",
                ))
            });
            if let Err(failure) = handled {
                self.reporter.report(&BatchEvent::Failed {
                    descriptor: descriptor.clone(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                });
                failures.push(FailedSource {
                    descriptor,
                    failure,
                });
            }
        }

        let catalog_path = output.join(CATALOG_FILE_NAME);
        let catalog_entries = catalog.len();
        output::write_json_atomic(&catalog_path, &catalog.finish()).map_err(|source| {
            BatchError::WriteCatalog {
                path: catalog_path.clone(),
                source,
            }
        })?;
        self.reporter.report(&BatchEvent::CatalogWritten {
            path: catalog_path.clone(),
            entries: catalog_entries,
        });

        Ok(BatchResult {
            failures,
            catalog_entries,
            catalog_path,
        })
    }

    fn handle(
        &self,
        descriptor_path: &Utf8Path,
        location: &ArtifactLocation,
        catalog: &mut CatalogBuilder,
    ) -> Result<(), SourceFailure> {
        if let Some(reserved) = location.reserved_collision() {
            return Err(SourceFailure::new(
                FailureKind::InvalidDescriptor,
                format_args!(
                    "artefact {} would overwrite the generated {reserved} file",
                    location.catalog_path
                ),
            ));
        }
        let descriptor = load_descriptor(descriptor_path)?;
        self.registry
            .lookup(&descriptor.filetype)
            .map_err(|err| SourceFailure::new(FailureKind::UnknownFormat, err))?;

        let decision = freshness::decide(descriptor_path, &location.artifact, self.force)
            .map_err(|err| SourceFailure::new(FailureKind::UnexpectedFailure, err))?;
        let reused = match decision {
            Decision::Reuse => match output::read_artifact(&location.artifact) {
                Ok(artifact) => Some(artifact),
                Err(err) => {
                    self.reporter.report(&BatchEvent::Unreadable {
                        artifact: location.artifact.clone(),
                        message: err.to_string(),
                    });
                    None
                }
            },
            Decision::Regenerate(_) => None,
        };

        let artifact = if let Some(artifact) = reused {
            self.reporter.report(&BatchEvent::Reused {
                descriptor: descriptor_path.to_owned(),
                artifact: location.artifact.clone(),
            });
            artifact
        } else {
            let reason = match decision {
                Decision::Regenerate(reason) => reason,
                Decision::Reuse => RegenerateReason::Unreadable,
            };
            self.reporter.report(&BatchEvent::Regenerating {
                descriptor: descriptor_path.to_owned(),
                reason,
            });
            self.processor.process(&descriptor, location)?
        };

        catalog.push(&artifact, &location.catalog_path);
        Ok(())
    }
}

/// Descriptor files under `sources`, sorted by path.
///
/// A file argument is returned as is; a directory is walked recursively for
/// `*.json` files.
pub fn enumerate_descriptors(sources: &Utf8Path) -> Result<Vec<Utf8PathBuf>, BatchError> {
    let inspect = |source| BatchError::Inspect {
        path: sources.to_owned(),
        source,
    };
    if !openbounds_fs::dir_is_dir(sources).map_err(inspect)? {
        return match openbounds_fs::file_is_file(sources) {
            Ok(true) => Ok(vec![sources.to_owned()]),
            Ok(false) => Err(BatchError::SourcesMissing {
                path: sources.to_owned(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BatchError::SourcesMissing {
                    path: sources.to_owned(),
                })
            }
            Err(err) => Err(inspect(err)),
        };
    }

    let mut descriptors = Vec::new();
    for entry in WalkDir::new(sources) {
        let entry = entry.map_err(|source| BatchError::Enumerate {
            path: sources.to_owned(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::try_from(entry.into_path()).map_err(|err| {
            BatchError::NonUtf8Path {
                path: err.as_path().to_string_lossy().into_owned(),
            }
        })?;
        if path.extension() == Some(DESCRIPTOR_EXTENSION) {
            descriptors.push(path);
        }
    }
    descriptors.sort();
    Ok(descriptors)
}

fn load_descriptor(path: &Utf8Path) -> Result<SourceDescriptor, SourceFailure> {
    let file = openbounds_fs::open_utf8_file(path).map_err(|err| {
        SourceFailure::new(
            FailureKind::InvalidDescriptor,
            format_args!("failed to open descriptor: {err}"),
        )
    })?;
    SourceDescriptor::from_reader(BufReader::new(file))
        .map_err(|err| SourceFailure::new(FailureKind::InvalidDescriptor, err))
}
