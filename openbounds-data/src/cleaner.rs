//! Removal of byproducts left behind by earlier runs.
//!
//! Scanning and deletion are separate steps: [`stale_artifacts`] lists what
//! would go, [`remove_stale`] deletes it.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::output::LABELS_SUFFIX;

const DESCRIPTOR_EXTENSION: &str = ".json";

/// Entries of `dir` generated for the artefact base name `base`.
///
/// An entry matches when its name, with the labels suffix or a single
/// trailing extension removed, equals `base`. That covers the artefact, its
/// labels file and a sub-directory named `base`. Descriptor files (`.json`)
/// are never listed so an output tree shared with the sources stays intact.
///
/// `source_dir` is the directory holding the descriptor. A sub-directory of
/// `dir` whose name also exists as a directory in `source_dir` mirrors
/// descriptors of its own and is never listed. A missing directory yields no
/// entries.
pub fn stale_artifacts(
    dir: &Utf8Path,
    base: &str,
    source_dir: &Utf8Path,
) -> io::Result<Vec<Utf8PathBuf>> {
    if !openbounds_fs::dir_is_dir(dir)? {
        return Ok(Vec::new());
    }
    let mut stale = Vec::new();
    for entry in openbounds_fs::list_dir(dir)? {
        if generated_base(&entry.name) != base {
            continue;
        }
        let keep = if entry.is_dir {
            openbounds_fs::dir_is_dir(&source_dir.join(&entry.name))?
        } else {
            entry.name.ends_with(DESCRIPTOR_EXTENSION)
        };
        if !keep {
            stale.push(dir.join(entry.name));
        }
    }
    Ok(stale)
}

/// Delete every entry reported by [`stale_artifacts`], returning what was removed.
pub fn remove_stale(
    dir: &Utf8Path,
    base: &str,
    source_dir: &Utf8Path,
) -> io::Result<Vec<Utf8PathBuf>> {
    let stale = stale_artifacts(dir, base, source_dir)?;
    for path in &stale {
        openbounds_fs::remove_path(path)?;
    }
    Ok(stale)
}

fn generated_base(name: &str) -> &str {
    if let Some(stem) = name.strip_suffix(LABELS_SUFFIX) {
        return stem;
    }
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
