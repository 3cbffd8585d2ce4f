//! GeoJSON reader, optionally unpacking a zip archive first.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use camino::Utf8Path;
use openbounds_core::{AdapterError, FeatureCollection, Properties, ReadRequest, SourceAdapter};
use zip::ZipArchive;

/// Filetype tag handled by [`GeoJsonAdapter`].
pub const GEOJSON_TAG: &str = "geojson";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ANY_GEOJSON_ENTRY: &str = "*.geojson";

/// Reads a GeoJSON `FeatureCollection`, directly or from a zip entry.
///
/// Descriptor `properties` act as a rename map from output key to source key:
/// when present, each retained feature keeps exactly the mapped keys. The
/// filter runs against the source properties before renaming. `layerName` is
/// not meaningful for GeoJSON and is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonAdapter;

impl SourceAdapter for GeoJsonAdapter {
    fn read(&self, request: &ReadRequest<'_>) -> Result<FeatureCollection, AdapterError> {
        let raw = read_payload(request)?;
        let mut collection: FeatureCollection =
            serde_json::from_slice(&raw).map_err(|err| AdapterError::Decode {
                path: request.path.to_owned(),
                message: err.to_string(),
            })?;
        if let Some(filter) = request.filter {
            collection
                .features
                .retain(|feature| filter.matches(&feature.properties));
        }
        if !request.properties.is_empty() {
            for feature in &mut collection.features {
                feature.properties = rename(&feature.properties, request.properties);
            }
        }
        Ok(collection)
    }
}

fn read_payload(request: &ReadRequest<'_>) -> Result<Vec<u8>, AdapterError> {
    let io_error = |source| AdapterError::Io {
        path: request.path.to_owned(),
        source,
    };
    let mut file = openbounds_fs::open_utf8_file(request.path).map_err(io_error)?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw).map_err(io_error)?;
    if request.filename_in_zip.is_some() || is_zip_path(request.path) || raw.starts_with(ZIP_MAGIC) {
        read_archive_entry(request.path, raw, request.filename_in_zip)
    } else {
        Ok(raw)
    }
}

fn is_zip_path(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"))
}

fn is_geojson_entry(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !lower.ends_with('/') && (lower.ends_with(".geojson") || lower.ends_with(".json"))
}

fn read_archive_entry(
    path: &Utf8Path,
    raw: Vec<u8>,
    entry: Option<&str>,
) -> Result<Vec<u8>, AdapterError> {
    let malformed = |err: zip::result::ZipError| AdapterError::MalformedArchive {
        path: path.to_owned(),
        message: err.to_string(),
    };
    let mut archive = ZipArchive::new(Cursor::new(raw)).map_err(malformed)?;
    let index = match entry {
        Some(name) => archive.index_for_name(name),
        None => (0..archive.len())
            .find(|&index| archive.name_for_index(index).is_some_and(is_geojson_entry)),
    }
    .ok_or_else(|| AdapterError::MissingEntry {
        path: path.to_owned(),
        entry: entry.unwrap_or(ANY_GEOJSON_ENTRY).to_owned(),
    })?;

    let mut file = archive.by_index(index).map_err(malformed)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|source| AdapterError::Io {
            path: path.to_owned(),
            source,
        })?;
    Ok(contents)
}

fn rename(source: &Properties, mapping: &BTreeMap<String, String>) -> Properties {
    mapping
        .iter()
        .filter_map(|(output_key, source_key)| {
            source
                .get(source_key)
                .map(|value| (output_key.clone(), value.clone()))
        })
        .collect()
}
