//! Output tree layout and GeoJSON file I/O.

use std::io::{self, BufReader, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use openbounds_core::{Artifact, CATALOG_FILE_NAME};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Extension of generated artefacts.
pub const ARTIFACT_EXTENSION: &str = "geojson";
/// Suffix of the label-points file written next to each artefact.
pub const LABELS_SUFFIX: &str = ".labels.geojson";

/// Failure to load a previously written artefact.
#[derive(Debug, Error)]
pub enum ArtifactReadError {
    /// The file could not be opened or read.
    #[error("failed to read artefact {path}: {source}")]
    Io {
        /// Artefact location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not a GeoJSON feature collection.
    #[error("failed to decode artefact {path}: {source}")]
    Decode {
        /// Artefact location.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

/// Where one descriptor's outputs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// Absolute or output-rooted artefact path.
    pub artifact: Utf8PathBuf,
    /// Artefact path relative to the output root, `/`-separated.
    pub catalog_path: String,
    /// Directory holding the descriptor.
    pub source_dir: Utf8PathBuf,
}

impl ArtifactLocation {
    /// Mirror `descriptor`, found under `sources_root`, into `output_root`.
    ///
    /// When `sources_root` is the descriptor file itself only the file name is
    /// kept. The trailing extension becomes `.geojson`.
    pub fn mirror(sources_root: &Utf8Path, descriptor: &Utf8Path, output_root: &Utf8Path) -> Self {
        let relative = match descriptor.strip_prefix(sources_root) {
            Ok(relative) if !relative.as_str().is_empty() => relative.to_owned(),
            _ => Utf8PathBuf::from(descriptor.file_name().unwrap_or(descriptor.as_str())),
        };
        let relative = relative.with_extension(ARTIFACT_EXTENSION);
        let catalog_path = relative
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let source_dir = descriptor
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_owned);
        Self {
            artifact: output_root.join(&relative),
            catalog_path,
            source_dir,
        }
    }

    /// Name of the generated file this artefact would overwrite, if any.
    ///
    /// The catalog at the output root and label-points files are written by
    /// the batch itself; an artefact mirrored onto either is refused.
    pub fn reserved_collision(&self) -> Option<&'static str> {
        if self.catalog_path == CATALOG_FILE_NAME {
            Some(CATALOG_FILE_NAME)
        } else if self.catalog_path.ends_with(LABELS_SUFFIX) {
            Some(LABELS_SUFFIX)
        } else {
            None
        }
    }

    /// Directory holding the artefact.
    pub fn dir(&self) -> &Utf8Path {
        self.artifact.parent().unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Artefact file name without its extension.
    pub fn base_name(&self) -> &str {
        self.artifact.file_stem().unwrap_or_default()
    }

    /// Sibling label-points file.
    pub fn labels(&self) -> Utf8PathBuf {
        self.dir().join(format!("{}{LABELS_SUFFIX}", self.base_name()))
    }
}

/// Serialise `value` to `path` through a temporary sibling file.
///
/// The destination is replaced only once the content is fully written.
pub fn write_json_atomic(path: &Utf8Path, value: &impl Serialize) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let dir = if dir.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        dir
    };
    let staging = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(staging);
    serde_json::to_writer(&mut writer, value).map_err(io::Error::from)?;
    writer.flush()?;
    let staging = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    staging.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Load an artefact written by an earlier run.
pub fn read_artifact(path: &Utf8Path) -> Result<Artifact, ArtifactReadError> {
    let file = openbounds_fs::open_utf8_file(path).map_err(|source| ArtifactReadError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactReadError::Decode {
        path: path.to_owned(),
        source,
    })
}
