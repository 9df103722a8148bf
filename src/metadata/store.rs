use std::path::Path;

use tracing::{debug, warn};

use crate::model::{ArchiveId, FileFingerprint};

use super::{MetadataDatabase, MetadataError};

/// Result of comparing a file against its stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    /// No record, or the record differs: upload and commit this fingerprint afterwards.
    Upload(FileFingerprint),
    /// The stored fingerprint matches the file on disk.
    NotNeeded,
}

/// What `MetadataStore::commit` observed after writing the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The file on disk no longer matches the fingerprint captured before upload.
    pub changed_during_upload: bool,
    /// Archive id moved into the history by this commit.
    pub superseded: Option<ArchiveId>,
}

/// Owns at most one open metadata database, reused while calls target the same directory.
///
/// Switching directories closes the previous database before the next one is opened.
/// The handle is released on `close` or when the store is dropped.
#[derive(Default)]
pub struct MetadataStore {
    open: Option<MetadataDatabase>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory whose database is currently open, if any.
    pub fn open_directory(&self) -> Option<&Path> {
        self.open.as_ref().map(MetadataDatabase::directory)
    }

    /// Decide whether `filename` needs uploading by comparing its current stat data
    /// with the stored record.
    pub fn check_include(
        &mut self,
        directory: &Path,
        filename: &str,
    ) -> Result<Inclusion, MetadataError> {
        let path = directory.join(filename);
        let current = FileFingerprint::read(&path)
            .map_err(|source| MetadataError::Stat { path, source })?;
        let db = self.database_for(directory)?;
        match db.get_record(filename)? {
            Some(record) if record.fingerprint == current => {
                debug!(
                    directory = %directory.display(),
                    filename,
                    "Fingerprint unchanged since last upload"
                );
                Ok(Inclusion::NotNeeded)
            }
            Some(_) => {
                debug!(directory = %directory.display(), filename, "Fingerprint changed");
                Ok(Inclusion::Upload(current))
            }
            None => {
                debug!(directory = %directory.display(), filename, "No previous upload recorded");
                Ok(Inclusion::Upload(current))
            }
        }
    }

    /// Record a successful upload, then re-stat the file to detect changes made while
    /// the upload was running.
    ///
    /// The stored fingerprint is always `decided`, so a file that drifted is picked up
    /// again on the next run.
    pub fn commit(
        &mut self,
        directory: &Path,
        filename: &str,
        decided: FileFingerprint,
        archive_id: &ArchiveId,
    ) -> Result<CommitOutcome, MetadataError> {
        let db = self.database_for(directory)?;
        let superseded = db.record_upload(filename, decided, archive_id)?;
        let path = directory.join(filename);
        let changed_during_upload = match FileFingerprint::read(&path) {
            Ok(current) => current != decided,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "File vanished after upload");
                true
            }
        };
        if changed_during_upload {
            warn!(path = %path.display(), "File changed while uploading");
        }
        Ok(CommitOutcome {
            changed_during_upload,
            superseded,
        })
    }

    /// Release the open database, if any. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<(), MetadataError> {
        match self.open.take() {
            Some(db) => {
                debug!(directory = %db.directory().display(), "Closing metadata database");
                db.close()
            }
            None => Ok(()),
        }
    }

    fn database_for(&mut self, directory: &Path) -> Result<&MetadataDatabase, MetadataError> {
        let db = match self.open.take() {
            Some(db) if db.directory() == directory => db,
            Some(previous) => {
                debug!(
                    directory = %previous.directory().display(),
                    "Closing metadata database before switching directories"
                );
                previous.close()?;
                Self::open_for(directory)?
            }
            None => Self::open_for(directory)?,
        };
        Ok(self.open.insert(db))
    }

    fn open_for(directory: &Path) -> Result<MetadataDatabase, MetadataError> {
        debug!(directory = %directory.display(), "Opening metadata database");
        MetadataDatabase::open(directory)
    }
}

impl Drop for MetadataStore {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Failed to close metadata database");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &[u8]) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn set_mtime(path: &Path, secs: u64) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn unknown_files_always_need_upload() {
        let dir = tempdir().unwrap();
        write(dir.path(), "one.txt", b"one");
        let mut store = MetadataStore::new();
        let inclusion = store.check_include(dir.path(), "one.txt").unwrap();
        assert!(matches!(inclusion, Inclusion::Upload(fp) if fp.size == 3));
    }

    #[test]
    fn commit_then_check_is_not_needed() {
        let dir = tempdir().unwrap();
        write(dir.path(), "one.txt", b"one");
        let mut store = MetadataStore::new();
        let Inclusion::Upload(fingerprint) = store.check_include(dir.path(), "one.txt").unwrap()
        else {
            panic!("expected upload");
        };
        let outcome = store
            .commit(dir.path(), "one.txt", fingerprint, &ArchiveId::from_string("a"))
            .unwrap();
        assert!(!outcome.changed_during_upload);
        assert!(outcome.superseded.is_none());
        assert_eq!(
            store.check_include(dir.path(), "one.txt").unwrap(),
            Inclusion::NotNeeded
        );
    }

    #[test]
    fn mtime_change_alone_triggers_upload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.txt");
        write(dir.path(), "one.txt", b"one");
        set_mtime(&path, 1_000);
        let mut store = MetadataStore::new();
        let Inclusion::Upload(fingerprint) = store.check_include(dir.path(), "one.txt").unwrap()
        else {
            panic!("expected upload");
        };
        store
            .commit(dir.path(), "one.txt", fingerprint, &ArchiveId::from_string("a"))
            .unwrap();

        set_mtime(&path, 2_000);
        assert!(matches!(
            store.check_include(dir.path(), "one.txt").unwrap(),
            Inclusion::Upload(_)
        ));
    }

    #[test]
    fn drift_is_reported_and_stale_fingerprint_kept() {
        let dir = tempdir().unwrap();
        write(dir.path(), "one.txt", b"one");
        let mut store = MetadataStore::new();
        let Inclusion::Upload(fingerprint) = store.check_include(dir.path(), "one.txt").unwrap()
        else {
            panic!("expected upload");
        };

        write(dir.path(), "one.txt", b"one plus more");
        let outcome = store
            .commit(dir.path(), "one.txt", fingerprint, &ArchiveId::from_string("a"))
            .unwrap();
        assert!(outcome.changed_during_upload);

        let db = MetadataDatabase::open(dir.path()).unwrap();
        assert_eq!(db.get_record("one.txt").unwrap().unwrap().fingerprint, fingerprint);
        assert!(matches!(
            store.check_include(dir.path(), "one.txt").unwrap(),
            Inclusion::Upload(_)
        ));
    }

    #[test]
    fn vanished_file_counts_as_drift() {
        let dir = tempdir().unwrap();
        write(dir.path(), "one.txt", b"one");
        let mut store = MetadataStore::new();
        let Inclusion::Upload(fingerprint) = store.check_include(dir.path(), "one.txt").unwrap()
        else {
            panic!("expected upload");
        };
        std::fs::remove_file(dir.path().join("one.txt")).unwrap();
        let outcome = store
            .commit(dir.path(), "one.txt", fingerprint, &ArchiveId::from_string("a"))
            .unwrap();
        assert!(outcome.changed_during_upload);
    }

    #[test]
    fn missing_file_is_a_stat_error() {
        let dir = tempdir().unwrap();
        let mut store = MetadataStore::new();
        let err = store.check_include(dir.path(), "absent.txt").unwrap_err();
        assert!(err.is_stat_error());
        assert!(store.open_directory().is_none());
    }

    #[test]
    fn switching_directories_reopens_the_store() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write(first.path(), "a.txt", b"a");
        write(second.path(), "b.txt", b"b");
        let mut store = MetadataStore::new();

        store.check_include(first.path(), "a.txt").unwrap();
        assert_eq!(store.open_directory(), Some(first.path()));
        store.check_include(second.path(), "b.txt").unwrap();
        assert_eq!(store.open_directory(), Some(second.path()));

        store.close().unwrap();
        assert!(store.open_directory().is_none());
        store.close().unwrap();
    }

    #[test]
    fn stores_are_independent_per_directory() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write(first.path(), "same.txt", b"same");
        write(second.path(), "same.txt", b"same");
        let mut store = MetadataStore::new();
        let Inclusion::Upload(fingerprint) = store.check_include(first.path(), "same.txt").unwrap()
        else {
            panic!("expected upload");
        };
        store
            .commit(first.path(), "same.txt", fingerprint, &ArchiveId::from_string("a"))
            .unwrap();

        assert!(matches!(
            store.check_include(second.path(), "same.txt").unwrap(),
            Inclusion::Upload(_)
        ));
        assert_eq!(
            store.check_include(first.path(), "same.txt").unwrap(),
            Inclusion::NotNeeded
        );
    }
}
