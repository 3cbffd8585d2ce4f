//! Vector-tile generation through an external `tippecanoe` process.
//!
//! Sources come either from a catalog's `path` properties or from explicit
//! GeoJSON files and directories. The builder is spawned directly, never
//! through a shell.

use std::ffi::OsString;
use std::io::{self, BufReader};
use std::process::{Command, ExitStatus};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use openbounds_core::{CATALOG_FILE_NAME, FeatureCollection, PATH_KEY};
use thiserror::Error;
use walkdir::WalkDir;

use crate::output::LABELS_SUFFIX;

/// Default lowest zoom level.
pub const DEFAULT_MIN_ZOOM: u8 = 5;
/// Default highest zoom level.
pub const DEFAULT_MAX_ZOOM: u8 = 14;
/// Default tile layer name.
pub const DEFAULT_LAYER: &str = "lands";
/// Default builder executable.
pub const DEFAULT_TIPPECANOE: &str = "tippecanoe";

const FIXED_FLAGS: [&str; 6] = [
    "--no-progress-indicator",
    "--no-polygon-splitting",
    "--coalesce",
    "--reverse",
    "--reorder",
    "--detect-shared-borders",
];

/// Errors raised while preparing or running the tile builder.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TilingError {
    /// The output file already exists.
    #[error("output path {path} already exists")]
    OutputExists {
        /// Requested output.
        path: Utf8PathBuf,
    },
    /// No GeoJSON source was found.
    #[error("no geojson sources found")]
    NoSources,
    /// The zoom range is inverted.
    #[error("min zoom {min} is greater than max zoom {max}")]
    InvalidZoomRange {
        /// Requested minimum zoom.
        min: u8,
        /// Requested maximum zoom.
        max: u8,
    },
    /// A source path could not be inspected or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The catalog is not a GeoJSON feature collection.
    #[error("failed to decode catalog {path}: {source}")]
    Catalog {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A catalog entry has no string `path` property.
    #[error("catalog entry {index} in {path} has no `path` property")]
    MissingPath {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Zero-based entry index.
        index: usize,
    },
    /// Walking a source directory failed.
    #[error("failed to scan {path}: {source}")]
    Scan {
        /// Directory being scanned.
        path: Utf8PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
    /// The builder could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Builder executable.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The builder exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Failed {
        /// Builder executable.
        program: String,
        /// Exit status.
        status: ExitStatus,
    },
}

/// Where tile sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilingSources {
    /// Entries of a catalog written by a batch run.
    Catalog(Utf8PathBuf),
    /// GeoJSON files or directories to scan.
    Paths(Vec<Utf8PathBuf>),
}

/// A fully validated tiling job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingRequest {
    /// MBTiles file to create.
    pub output: Utf8PathBuf,
    /// Source selection.
    pub sources: TilingSources,
    /// Lowest zoom level.
    pub min_zoom: u8,
    /// Highest zoom level.
    pub max_zoom: u8,
    /// Tile layer name.
    pub layer: String,
    /// Builder executable.
    pub program: String,
}

impl TilingRequest {
    /// A request with default zoom range, layer and builder.
    pub fn new(output: impl Into<Utf8PathBuf>, sources: TilingSources) -> Self {
        Self {
            output: output.into(),
            sources,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            layer: DEFAULT_LAYER.to_owned(),
            program: DEFAULT_TIPPECANOE.to_owned(),
        }
    }

    /// Check the output and zoom range, then resolve the source files.
    pub fn prepare(&self) -> Result<Vec<Utf8PathBuf>, TilingError> {
        let exists = openbounds_fs::modified_time(&self.output)
            .map_err(|source| TilingError::Io {
                path: self.output.clone(),
                source,
            })?
            .is_some();
        if exists {
            return Err(TilingError::OutputExists {
                path: self.output.clone(),
            });
        }
        if self.min_zoom > self.max_zoom {
            return Err(TilingError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        let sources = resolve_sources(&self.sources)?;
        if sources.is_empty() {
            return Err(TilingError::NoSources);
        }
        Ok(sources)
    }

    /// Builder invocation for `sources`.
    pub fn command(&self, sources: &[Utf8PathBuf]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.arguments(sources));
        command
    }

    /// Arguments passed to the builder, in order.
    pub fn arguments(&self, sources: &[Utf8PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-o".into(), self.output.as_os_str().to_owned()];
        args.extend(sources.iter().map(|source| source.as_os_str().to_owned()));
        args.extend(FIXED_FLAGS.iter().map(OsString::from));
        args.extend([
            "-l".into(),
            self.layer.clone().into(),
            "-z".into(),
            self.max_zoom.to_string().into(),
            "-Z".into(),
            self.min_zoom.to_string().into(),
        ]);
        args
    }

    /// Validate, resolve sources and run the builder to completion.
    pub fn run(&self) -> Result<(), TilingError> {
        let sources = self.prepare()?;
        info!("{} geojson files found", sources.len());
        let mut command = self.command(&sources);
        info!("running {command:?}");
        let status = command.status().map_err(|source| TilingError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(TilingError::Failed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// GeoJSON files selected by `sources`, in a stable order.
pub fn resolve_sources(sources: &TilingSources) -> Result<Vec<Utf8PathBuf>, TilingError> {
    match sources {
        TilingSources::Catalog(catalog) => catalog_sources(catalog),
        TilingSources::Paths(paths) => {
            let mut resolved = Vec::new();
            for path in paths {
                resolved.extend(scan_sources(path)?);
            }
            Ok(resolved)
        }
    }
}

fn catalog_sources(catalog: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TilingError> {
    let file = openbounds_fs::open_utf8_file(catalog).map_err(|source| TilingError::Io {
        path: catalog.to_owned(),
        source,
    })?;
    let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| TilingError::Catalog {
            path: catalog.to_owned(),
            source,
        })?;
    let base = catalog.parent().unwrap_or_else(|| Utf8Path::new(""));
    collection
        .features
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            entry
                .properties
                .get(PATH_KEY)
                .and_then(|value| value.as_str())
                .map(|relative| base.join(relative))
                .ok_or_else(|| TilingError::MissingPath {
                    path: catalog.to_owned(),
                    index,
                })
        })
        .collect()
}

fn scan_sources(path: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TilingError> {
    let is_dir = openbounds_fs::dir_is_dir(path).map_err(|source| TilingError::Io {
        path: path.to_owned(),
        source,
    })?;
    if !is_dir {
        return Ok(if is_tile_source(path) {
            vec![path.to_owned()]
        } else {
            Vec::new()
        });
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|source| TilingError::Scan {
            path: path.to_owned(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(candidate) = Utf8PathBuf::try_from(entry.into_path()) {
            if is_tile_source(&candidate) {
                found.push(candidate);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_tile_source(path: &Utf8Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    path.extension() == Some("geojson") && name != CATALOG_FILE_NAME && !name.ends_with(LABELS_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::workspace_dir;
    use rstest::rstest;
    use serde_json::json;
    use std::fs;

    fn write(path: &Utf8Path, contents: &[u8]) {
        openbounds_fs::ensure_parent_dir(path).expect("parent");
        fs::write(path, contents).expect("write");
    }

    #[rstest]
    fn arguments_follow_the_builder_contract() {
        let request = TilingRequest::new("out.mbtiles", TilingSources::Paths(Vec::new()));
        let args = request.arguments(&[Utf8PathBuf::from("a.geojson"), Utf8PathBuf::from("b.geojson")]);
        let rendered: Vec<_> = args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();
        assert_eq!(
            rendered,
            vec![
                "-o",
                "out.mbtiles",
                "a.geojson",
                "b.geojson",
                "--no-progress-indicator",
                "--no-polygon-splitting",
                "--coalesce",
                "--reverse",
                "--reorder",
                "--detect-shared-borders",
                "-l",
                "lands",
                "-z",
                "14",
                "-Z",
                "5",
            ]
        );
    }

    #[rstest]
    fn directories_skip_catalog_and_labels() {
        let (_dir, root) = workspace_dir();
        for name in [
            "catalog.geojson",
            "fr/lands.geojson",
            "fr/lands.labels.geojson",
            "fr/lands.json",
            "be.geojson",
        ] {
            write(&root.join(name), b"{}");
        }
        let sources = resolve_sources(&TilingSources::Paths(vec![root.clone()])).expect("resolve");
        assert_eq!(sources, vec![root.join("be.geojson"), root.join("fr/lands.geojson")]);
    }

    #[rstest]
    fn catalog_paths_resolve_against_the_catalog_directory() {
        let (_dir, root) = workspace_dir();
        let catalog = root.join("out/catalog.geojson");
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": null, "properties": {"path": "fr/lands.geojson"}},
                {"type": "Feature", "geometry": null, "properties": {"path": "be.geojson"}}
            ]
        });
        write(&catalog, body.to_string().as_bytes());

        let sources = resolve_sources(&TilingSources::Catalog(catalog)).expect("resolve");
        assert_eq!(
            sources,
            vec![root.join("out/fr/lands.geojson"), root.join("out/be.geojson")]
        );
    }

    #[rstest]
    fn catalog_entries_need_a_path() {
        let (_dir, root) = workspace_dir();
        let catalog = root.join("catalog.geojson");
        let body = json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "geometry": null, "properties": {}}]
        });
        write(&catalog, body.to_string().as_bytes());
        let err = resolve_sources(&TilingSources::Catalog(catalog)).expect_err("no path");
        assert!(matches!(err, TilingError::MissingPath { index: 0, .. }), "unexpected {err:?}");
    }

    #[rstest]
    fn existing_outputs_are_refused() {
        let (_dir, root) = workspace_dir();
        let output = root.join("tiles.mbtiles");
        write(&output, b"");
        let request = TilingRequest::new(output, TilingSources::Paths(vec![root.clone()]));
        assert!(matches!(request.prepare(), Err(TilingError::OutputExists { .. })));
    }

    #[rstest]
    fn inverted_zoom_ranges_are_refused() {
        let (_dir, root) = workspace_dir();
        write(&root.join("lands.geojson"), b"{}");
        let mut request =
            TilingRequest::new(root.join("tiles.mbtiles"), TilingSources::Paths(vec![root.clone()]));
        request.min_zoom = 10;
        request.max_zoom = 4;
        assert!(matches!(
            request.prepare(),
            Err(TilingError::InvalidZoomRange { min: 10, max: 4 })
        ));
    }

    #[rstest]
    fn empty_selections_are_refused() {
        let (_dir, root) = workspace_dir();
        let request =
            TilingRequest::new(root.join("tiles.mbtiles"), TilingSources::Paths(vec![root.clone()]));
        assert!(matches!(request.prepare(), Err(TilingError::NoSources)));
    }

    #[rstest]
    fn missing_builders_fail_to_spawn() {
        let (_dir, root) = workspace_dir();
        write(&root.join("lands.geojson"), b"{}");
        let mut request =
            TilingRequest::new(root.join("tiles.mbtiles"), TilingSources::Paths(vec![root.clone()]));
        request.program = "openbounds-missing-tile-builder".to_owned();
        assert!(matches!(request.run(), Err(TilingError::Spawn { .. })));
    }
}
