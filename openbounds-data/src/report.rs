//! Progress reporting sink for the batch pipeline.

use std::fmt;

use camino::Utf8PathBuf;
use log::{debug, error, info, warn};

use crate::freshness::RegenerateReason;
use crate::processor::FailureKind;

/// Something worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// A fresh artefact was kept.
    Reused {
        /// Descriptor being processed.
        descriptor: Utf8PathBuf,
        /// Artefact that was kept.
        artifact: Utf8PathBuf,
    },
    /// An artefact is being rebuilt.
    Regenerating {
        /// Descriptor being processed.
        descriptor: Utf8PathBuf,
        /// Why the artefact is rebuilt.
        reason: RegenerateReason,
    },
    /// A remote resource is being downloaded.
    Downloading {
        /// Resource URL.
        url: String,
    },
    /// A byproduct from an earlier run was removed.
    Removed {
        /// Removed file or directory.
        path: Utf8PathBuf,
    },
    /// An artefact was written.
    Written {
        /// Artefact location.
        artifact: Utf8PathBuf,
        /// Number of features it holds.
        feature_count: usize,
    },
    /// An existing artefact could not be decoded and will be rebuilt.
    Unreadable {
        /// Artefact location.
        artifact: Utf8PathBuf,
        /// Decoder message.
        message: String,
    },
    /// A source failed; the batch carries on.
    Failed {
        /// Descriptor that failed.
        descriptor: Utf8PathBuf,
        /// Failure category.
        kind: FailureKind,
        /// Human-readable detail.
        message: String,
    },
    /// The catalog was written.
    CatalogWritten {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Number of catalog entries.
        entries: usize,
    },
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused {
                descriptor,
                artifact,
            } => write!(
                f,
                "skipping {descriptor}: {artifact} is up to date (use --force to regenerate)"
            ),
            Self::Regenerating { descriptor, reason } => {
                write!(f, "processing {descriptor} ({reason})")
            }
            Self::Downloading { url } => write!(f, "downloading {url}"),
            Self::Removed { path } => write!(f, "removed stale {path}"),
            Self::Written {
                artifact,
                feature_count,
            } => write!(f, "wrote {feature_count} features to {artifact}"),
            Self::Unreadable { artifact, message } => {
                write!(f, "existing artefact {artifact} is unreadable: {message}")
            }
            Self::Failed {
                descriptor,
                kind,
                message,
            } => write!(f, "{descriptor} failed ({kind}): {message}"),
            Self::CatalogWritten { path, entries } => {
                write!(f, "wrote catalog {path} with {entries} entries")
            }
        }
    }
}

/// Receives pipeline events.
pub trait Reporter {
    /// Handle one event.
    fn report(&self, event: &BatchEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Failed { .. } => error!("{event}"),
            BatchEvent::Unreadable { .. } => warn!("{event}"),
            BatchEvent::Removed { .. } | BatchEvent::Regenerating { .. } => debug!("{event}"),
            BatchEvent::Reused { .. }
            | BatchEvent::Downloading { .. }
            | BatchEvent::Written { .. }
            | BatchEvent::CatalogWritten { .. } => info!("{event}"),
        }
    }
}
