//! Test helpers for laying out descriptor trees on disk.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use openbounds_data::test_support::{point_collection, workspace_dir};
use serde_json::json;
use tempfile::TempDir;

/// A temporary workspace with `sources/`, `data/` and `out/` directories.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let (dir, root) = workspace_dir();
        for child in ["sources", "data", "out"] {
            fs::create_dir_all(root.join(child)).expect("create workspace directory");
        }
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn sources(&self) -> Utf8PathBuf {
        self.root.join("sources")
    }

    pub(super) fn output(&self) -> Utf8PathBuf {
        self.root.join("out")
    }

    /// Write `count` point features to `data/` and a descriptor pointing at
    /// them through a `file://` URL.
    pub(super) fn local_geojson_source(&self, name: &str, count: usize) {
        let stem = Utf8Path::new(name).file_stem().expect("descriptor stem");
        let data = self.root.join("data").join(format!("{stem}.geojson"));
        let body = serde_json::to_vec(&point_collection(count)).expect("encode collection");
        fs::write(&data, body).expect("write source data");
        self.descriptor(
            name,
            &json!({"url": format!("file://{data}"), "filetype": "geojson"}),
        );
    }

    pub(super) fn descriptor(&self, name: &str, body: &serde_json::Value) {
        let path = self.sources().join(name);
        openbounds_fs::ensure_parent_dir(&path).expect("descriptor directory");
        fs::write(&path, body.to_string()).expect("write descriptor");
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    openbounds_fs::ensure_parent_dir(path).expect("parent directory");
    fs::write(path, contents).expect("write file");
}
