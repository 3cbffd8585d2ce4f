//! Reuse-or-regenerate decisions for existing artefacts.
//!
//! An artefact is fresh when its modification time is at or after the
//! descriptor's. Staleness always forces regeneration; a fresh artefact is
//! reused unless the caller forces regeneration.

use std::fmt;
use std::io;
use std::time::SystemTime;

use camino::Utf8Path;

/// Why an artefact must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerateReason {
    /// No artefact exists yet.
    Missing,
    /// The descriptor changed after the artefact was written.
    Stale,
    /// The artefact is fresh but regeneration was requested.
    Forced,
    /// The existing artefact could not be decoded.
    Unreadable,
}

impl fmt::Display for RegenerateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "no artefact",
            Self::Stale => "descriptor is newer",
            Self::Forced => "forced",
            Self::Unreadable => "artefact unreadable",
        })
    }
}

/// Outcome of the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the artefact already on disk.
    Reuse,
    /// Build the artefact again.
    Regenerate(RegenerateReason),
}

/// Decide from known modification times.
pub fn decide_from_times(
    descriptor_modified: SystemTime,
    artifact_modified: Option<SystemTime>,
    force: bool,
) -> Decision {
    match artifact_modified {
        None => Decision::Regenerate(RegenerateReason::Missing),
        Some(artifact) if artifact < descriptor_modified => {
            Decision::Regenerate(RegenerateReason::Stale)
        }
        Some(_) if force => Decision::Regenerate(RegenerateReason::Forced),
        Some(_) => Decision::Reuse,
    }
}

/// Decide whether the artefact at `artifact` can be reused for `descriptor`.
///
/// # Errors
///
/// Fails when the descriptor's metadata cannot be read, including when it
/// no longer exists.
pub fn decide(descriptor: &Utf8Path, artifact: &Utf8Path, force: bool) -> io::Result<Decision> {
    let descriptor_modified = openbounds_fs::modified_time(descriptor)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("descriptor {descriptor} does not exist"),
        )
    })?;
    let artifact_modified = openbounds_fs::modified_time(artifact)?;
    Ok(decide_from_times(descriptor_modified, artifact_modified, force))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn at(seconds: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(seconds)
    }

    #[rstest]
    #[case(None, false, Decision::Regenerate(RegenerateReason::Missing))]
    #[case(None, true, Decision::Regenerate(RegenerateReason::Missing))]
    #[case(Some(at(50)), false, Decision::Regenerate(RegenerateReason::Stale))]
    #[case(Some(at(50)), true, Decision::Regenerate(RegenerateReason::Stale))]
    #[case(Some(at(100)), false, Decision::Reuse)]
    #[case(Some(at(200)), false, Decision::Reuse)]
    #[case(Some(at(200)), true, Decision::Regenerate(RegenerateReason::Forced))]
    fn decisions_follow_times_and_force(
        #[case] artifact: Option<SystemTime>,
        #[case] force: bool,
        #[case] expected: Decision,
    ) {
        assert_eq!(decide_from_times(at(100), artifact, force), expected);
    }

    fn touch(path: &Utf8Path, modified: SystemTime) {
        let file = File::create(path).expect("create file");
        file.set_modified(modified).expect("set mtime");
    }

    #[rstest]
    fn reads_times_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir");
        let descriptor = root.join("lands.json");
        let artifact = root.join("lands.geojson");
        touch(&descriptor, at(1_000));

        assert_eq!(
            decide(&descriptor, &artifact, false).expect("decide"),
            Decision::Regenerate(RegenerateReason::Missing)
        );

        touch(&artifact, at(2_000));
        assert_eq!(decide(&descriptor, &artifact, false).expect("decide"), Decision::Reuse);

        touch(&descriptor, at(3_000));
        assert_eq!(
            decide(&descriptor, &artifact, false).expect("decide"),
            Decision::Regenerate(RegenerateReason::Stale)
        );
        fs::remove_file(&descriptor).expect("remove descriptor");
        assert!(decide(&descriptor, &artifact, false).is_err());
    }
}
