//! Reader capabilities keyed by descriptor filetype tags.
//!
//! An adapter turns a raw downloaded file into a [`FeatureCollection`]. The
//! [`AdapterRegistry`] maps filetype tags to adapters; unregistered tags are a
//! typed lookup failure.

use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::filter::FilterExpression;
use crate::geojson::FeatureCollection;

/// Everything an adapter needs to read one raw source file.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest<'a> {
    /// Local path of the downloaded resource.
    pub path: &'a Utf8Path,
    /// Adapter-specific descriptor settings.
    pub properties: &'a BTreeMap<String, String>,
    /// Optional feature filter; adapters drop features that do not match.
    pub filter: Option<&'a FilterExpression>,
    /// Optional layer selector.
    pub layer_name: Option<&'a str>,
    /// Optional archive entry selector.
    pub filename_in_zip: Option<&'a str>,
}

/// Errors reported by adapters while reading a source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdapterError {
    /// The raw file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Location of the raw file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The raw file was expected to be an archive but could not be opened.
    #[error("unable to open archive {path}: {message}")]
    MalformedArchive {
        /// Location of the raw file.
        path: Utf8PathBuf,
        /// Decoder message.
        message: String,
    },
    /// The requested archive entry does not exist.
    #[error("archive {path} has no entry named {entry}")]
    MissingEntry {
        /// Location of the raw file.
        path: Utf8PathBuf,
        /// Entry that was requested or searched for.
        entry: String,
    },
    /// The content did not match the adapter's format.
    #[error("failed to decode {path}: {message}")]
    Decode {
        /// Location of the raw file.
        path: Utf8PathBuf,
        /// Decoder message.
        message: String,
    },
}

/// Reads raw source files of one format.
pub trait SourceAdapter: Send + Sync {
    /// Read the resource described by `request`, applying its filter.
    fn read(&self, request: &ReadRequest<'_>) -> Result<FeatureCollection, AdapterError>;
}

impl<F> SourceAdapter for F
where
    F: Fn(&ReadRequest<'_>) -> Result<FeatureCollection, AdapterError> + Send + Sync,
{
    fn read(&self, request: &ReadRequest<'_>) -> Result<FeatureCollection, AdapterError> {
        self(request)
    }
}

/// Lookup failure for a filetype tag with no registered adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filetype `{tag}`")]
pub struct UnknownFiletype {
    /// The unregistered tag.
    pub tag: String,
}

/// Registry mapping filetype tags to adapters.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Box<dyn SourceAdapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tags", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under `tag`, returning any adapter it replaces.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        adapter: impl SourceAdapter + 'static,
    ) -> Option<Box<dyn SourceAdapter>> {
        self.adapters.insert(tag.into(), Box::new(adapter))
    }

    /// Builder-style variant of [`AdapterRegistry::register`].
    #[must_use]
    pub fn with(mut self, tag: impl Into<String>, adapter: impl SourceAdapter + 'static) -> Self {
        self.register(tag, adapter);
        self
    }

    /// Resolve the adapter registered for `tag`.
    pub fn lookup(&self, tag: &str) -> Result<&dyn SourceAdapter, UnknownFiletype> {
        self.adapters
            .get(tag)
            .map(AsRef::as_ref)
            .ok_or_else(|| UnknownFiletype {
                tag: tag.to_owned(),
            })
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}
