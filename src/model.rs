//! Value types shared by the metadata store, the transports and the orchestrator.

use std::{
    fs::Metadata,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of the stat data used to decide whether a file changed.
///
/// Captured once when inclusion is decided and carried unchanged to the post-upload
/// reconciliation. Two fingerprints are equal only when size and mtime both match.
///
/// Content is never inspected: a file rewritten with the same size whose mtime was reset
/// afterwards is indistinguishable from the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// File size in bytes.
    pub size: u64,
    /// Last modified timestamp in epoch nanoseconds, negative before the epoch.
    pub mtime_ns: i64,
}

impl FileFingerprint {
    pub fn new(size: u64, mtime_ns: i64) -> Self {
        Self { size, mtime_ns }
    }

    /// Stat `path` (following symlinks) and capture its fingerprint.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let meta = path.metadata()?;
        Self::from_metadata(&meta)
    }

    /// Build a fingerprint from already-fetched metadata.
    pub fn from_metadata(meta: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            size: meta.len(),
            mtime_ns: to_nanos(meta.modified()?),
        })
    }
}

fn to_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos().min(i64::MAX as u128) as i64,
        Err(before) => -(before.duration().as_nanos().min(i64::MAX as u128) as i64),
    }
}

/// Opaque identifier returned by an upload transport for one stored archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveId(String);

impl ArchiveId {
    /// Generate a random identifier, for transports that name archives themselves.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Rehydrate an identifier from a stored or transport-provided string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn fingerprint_tracks_size_and_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.txt");
        std::fs::write(&path, b"hello").unwrap();
        let stamp = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(stamp)
            .unwrap();

        let fingerprint = FileFingerprint::read(&path).unwrap();
        assert_eq!(fingerprint.size, 5);
        assert_eq!(fingerprint.mtime_ns, 1_700_000_000_000_000_000);
    }

    #[test]
    fn fingerprints_differ_when_either_field_differs() {
        let base = FileFingerprint::new(10, 5);
        assert_eq!(base, FileFingerprint::new(10, 5));
        assert_ne!(base, FileFingerprint::new(11, 5));
        assert_ne!(base, FileFingerprint::new(10, 6));
    }

    #[test]
    fn pre_epoch_times_are_negative() {
        let before = UNIX_EPOCH - Duration::from_secs(2);
        assert_eq!(to_nanos(before), -2_000_000_000);
    }

    #[test]
    fn missing_file_fails_to_fingerprint() {
        let dir = tempdir().unwrap();
        assert!(FileFingerprint::read(&dir.path().join("absent.txt")).is_err());
    }

    #[test]
    fn generated_archive_ids_are_unique() {
        assert_ne!(ArchiveId::generate(), ArchiveId::generate());
        assert_eq!(ArchiveId::from_string("abc").as_str(), "abc");
    }
}
