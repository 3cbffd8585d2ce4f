//! Test doubles for the build pipeline.
//!
//! [`StubFetcher`] serves in-memory resources without touching the network,
//! [`RecordingReporter`] captures events, and [`csv_points`] is a small
//! adapter for `lon,lat,...` text files used to exercise non-GeoJSON tags.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Read;

use camino::Utf8PathBuf;
use openbounds_core::{
    AdapterError, Feature, FeatureCollection, Geometry, Properties, ReadRequest,
};
use serde_json::Value;
use tempfile::TempDir;

use crate::fetch::{FetchedResource, ResourceFetcher, TransportError};
use crate::processor::FailureKind;
use crate::report::{BatchEvent, Reporter};

/// Stub [`ResourceFetcher`] backed by in-memory bytes keyed by URL.
///
/// Unknown URLs fail with an HTTP 404.
#[derive(Debug, Default)]
pub struct StubFetcher {
    resources: BTreeMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
    issued: RefCell<Vec<Utf8PathBuf>>,
}

impl StubFetcher {
    /// Fetcher serving `collection` at `url`.
    pub fn serving(url: &str, collection: FeatureCollection) -> Self {
        Self::default().with_collection(url, &collection)
    }

    /// Serve `collection` as GeoJSON at `url`.
    #[must_use]
    pub fn with_collection(self, url: &str, collection: &FeatureCollection) -> Self {
        let bytes = serde_json::to_vec(collection).expect("collections always encode");
        self.with_bytes(url, bytes)
    }

    /// Serve raw `bytes` at `url`.
    #[must_use]
    pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.resources.insert(url.to_owned(), bytes);
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Whether every temporary file handed out has since been deleted.
    pub fn all_released(&self) -> bool {
        self.issued.borrow().iter().all(|path| !path.exists())
    }
}

impl ResourceFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource, TransportError> {
        self.requests.borrow_mut().push(url.to_owned());
        let bytes = self.resources.get(url).ok_or_else(|| TransportError::Http {
            url: url.to_owned(),
            status: 404,
            message: "not found".to_owned(),
        })?;
        let file_name = url.rsplit('/').next().filter(|name| !name.is_empty());
        let resource =
            FetchedResource::from_bytes(file_name, bytes).map_err(|source| TransportError::Storage {
                url: url.to_owned(),
                source,
            })?;
        self.issued.borrow_mut().push(resource.path().to_owned());
        Ok(resource)
    }
}

/// Reporter that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<BatchEvent>>,
}

impl RecordingReporter {
    /// Events received so far.
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events.borrow().clone()
    }

    /// Descriptor paths and kinds of reported failures.
    pub fn failures(&self) -> Vec<(Utf8PathBuf, FailureKind)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                BatchEvent::Failed {
                    descriptor, kind, ..
                } => Some((descriptor.clone(), *kind)),
                _ => None,
            })
            .collect()
    }

    /// Number of reuse events.
    pub fn reused(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, BatchEvent::Reused { .. }))
            .count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &BatchEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Temporary directory and its UTF-8 path.
pub fn workspace_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temporary directory");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 temporary path");
    (dir, root)
}

/// `count` point features along the diagonal, each tagged with its `index`.
pub fn point_collection(count: usize) -> FeatureCollection {
    FeatureCollection::new(
        (0..count)
            .map(|index| {
                let offset = f64::from(u32::try_from(index).unwrap_or(u32::MAX));
                let mut properties = Properties::new();
                properties.insert("index".to_owned(), Value::from(index));
                Feature::new(Some(Geometry::Point(vec![offset, offset])), properties)
            })
            .collect(),
    )
}

/// Adapter for comma-separated text with `lon` and `lat` columns.
///
/// Every other column becomes a string property. The request's filter is
/// applied before features are returned.
pub fn csv_points(request: &ReadRequest<'_>) -> Result<FeatureCollection, AdapterError> {
    let mut text = String::new();
    openbounds_fs::open_utf8_file(request.path)
        .and_then(|mut file| file.read_to_string(&mut text))
        .map_err(|source| AdapterError::Io {
            path: request.path.to_owned(),
            source,
        })?;
    let decode = |message: String| AdapterError::Decode {
        path: request.path.to_owned(),
        message,
    };

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| decode("missing header".to_owned()))?
        .split(',')
        .map(str::trim)
        .collect();
    let column = |name: &str| {
        header
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or_else(|| decode(format!("missing `{name}` column")))
    };
    let (lon, lat) = (column("lon")?, column("lat")?);

    let mut features = Vec::new();
    for (row, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let coordinate = |index: usize| {
            cells
                .get(index)
                .and_then(|cell| cell.parse::<f64>().ok())
                .ok_or_else(|| decode(format!("row {row} has no valid coordinate")))
        };
        let position = vec![coordinate(lon)?, coordinate(lat)?];
        let properties: Properties = header
            .iter()
            .zip(&cells)
            .enumerate()
            .filter(|(index, _)| *index != lon && *index != lat)
            .map(|(_, (key, value))| ((*key).to_owned(), Value::from(*value)))
            .collect();
        if request.filter.is_none_or(|filter| filter.matches(&properties)) {
            features.push(Feature::new(Some(Geometry::Point(position)), properties));
        }
    }
    Ok(FeatureCollection::new(features))
}
