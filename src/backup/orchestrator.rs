use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::metadata::{Inclusion, MetadataError, MetadataStore, is_store_file, validate_filename};
use crate::model::{ArchiveId, FileFingerprint};
use crate::transport::{UploadTransport, error_report};

use super::errors::BackupError;
use super::filter::InclusionFilter;
use super::stats::{ErrorKind, ExclusionReason, RunStatistics};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct BackupSettings {
    pub filter: InclusionFilter,
    /// Decide and report, but neither upload nor touch metadata.
    pub dry_run: bool,
}

/// Terminal state reached by one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDecision {
    /// Rejected by the inclusion filter.
    Filtered,
    /// Unchanged since its last successful upload.
    Unchanged,
    /// Would have been uploaded, but the run is a dry run.
    DryRun,
    /// The transport failed; metadata left untouched so the next run retries.
    UploadFailed,
    /// Uploaded and committed.
    Uploaded {
        archive_id: ArchiveId,
        changed_during_upload: bool,
    },
}

/// Drives filter, metadata lookup, upload and reconciliation for one file at a time.
pub struct BackupOrchestrator<T: UploadTransport> {
    settings: BackupSettings,
    transport: T,
    store: MetadataStore,
    stats: RunStatistics,
    closed: bool,
}

impl<T: UploadTransport> BackupOrchestrator<T> {
    pub fn new(settings: BackupSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
            store: MetadataStore::new(),
            stats: RunStatistics::new(),
            closed: false,
        }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Back up a single file of `directory`.
    ///
    /// `directory` must be an existing absolute directory and `filename` a plain name of
    /// a regular file inside it; anything else is a caller bug and panics.
    ///
    /// Storage and stat failures are recorded as errored and returned so the caller can
    /// skip the file and continue.
    pub fn process_file(
        &mut self,
        directory: &Path,
        filename: &str,
    ) -> Result<FileDecision, BackupError> {
        debug!(directory = %directory.display(), filename, "Processing file");
        self.assert_open();
        assert_file_contract(directory, filename);

        if !self.settings.filter.should_include(filename) {
            self.stats
                .add_excluded(directory, filename, ExclusionReason::Filter);
            info!(filename, "Ignoring file (excluded by filter)");
            return Ok(FileDecision::Filtered);
        }

        let fingerprint = match self.store.check_include(directory, filename) {
            Ok(Inclusion::Upload(fingerprint)) => fingerprint,
            Ok(Inclusion::NotNeeded) => {
                self.stats
                    .add_excluded(directory, filename, ExclusionReason::Metadata);
                info!(filename, "Ignoring file (excluded by metadata)");
                return Ok(FileDecision::Unchanged);
            }
            Err(err) => return Err(self.record_store_error(directory, filename, err)),
        };
        self.stats.add_included(directory, filename);

        if self.settings.dry_run {
            info!(filename, "Dry run: not uploading");
            return Ok(FileDecision::DryRun);
        }

        let Some(archive_id) = self.upload(directory, filename, fingerprint) else {
            return Ok(FileDecision::UploadFailed);
        };

        let outcome = match self
            .store
            .commit(directory, filename, fingerprint, &archive_id)
        {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.record_store_error(directory, filename, err)),
        };
        if let Some(previous) = &outcome.superseded {
            debug!(filename, previous = %previous, "Superseded previous archive");
        }
        if outcome.changed_during_upload {
            self.stats.mark_changed_during_upload(directory, filename);
        }
        Ok(FileDecision::Uploaded {
            archive_id,
            changed_during_upload: outcome.changed_during_upload,
        })
    }

    /// Back up every regular file directly inside `directory`.
    ///
    /// Sub-directories and the metadata store's own files are skipped; symlinks are
    /// followed. A failure on one file is recorded, logged and does not stop the rest.
    pub fn process_directory(&mut self, directory: &Path) -> Result<(), BackupError> {
        self.process_directory_with_progress(directory, None, &mut |_, _| {})
    }

    /// Like `process_directory`, reporting progress and honoring `cancel` between files.
    pub fn process_directory_with_progress(
        &mut self,
        directory: &Path,
        cancel: Option<&AtomicBool>,
        on_progress: &mut impl FnMut(usize, &Path),
    ) -> Result<(), BackupError> {
        debug!(directory = %directory.display(), "Processing directory");
        self.assert_open();
        assert_directory_contract(directory);
        let mut seen = 0usize;
        for filename in self.list_candidate_files(directory)? {
            if let Some(cancel) = cancel
                && cancel.load(Ordering::Relaxed)
            {
                return Err(BackupError::Canceled);
            }
            if let Err(err) = self.process_file(directory, &filename) {
                warn!(
                    directory = %directory.display(),
                    filename,
                    error = %err,
                    "Skipping file after error"
                );
            }
            seen += 1;
            on_progress(seen, &directory.join(&filename));
        }
        Ok(())
    }

    /// Release the metadata store and the transport. Safe to call repeatedly.
    ///
    /// The transport is closed for good: processing files afterwards panics.
    pub fn close(&mut self) {
        if let Err(err) = self.store.close() {
            warn!(error = %err, "Failed to close metadata database");
        }
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.transport.close() {
            warn!(error = %err, "Failed to close transport; ignoring");
        }
    }

    /// Close everything and hand back the run statistics.
    pub fn finish(mut self) -> RunStatistics {
        self.close();
        std::mem::take(&mut self.stats)
    }

    fn assert_open(&self) {
        assert!(!self.closed, "orchestrator used after close");
    }

    fn upload(
        &mut self,
        directory: &Path,
        filename: &str,
        fingerprint: FileFingerprint,
    ) -> Option<ArchiveId> {
        info!(filename, "Starting upload");
        let started = Instant::now();
        match self.transport.upload(directory, filename) {
            Ok(archive_id) => {
                let secs = started.elapsed().as_secs_f64();
                let kib_per_sec = if secs > 0.0 {
                    fingerprint.size as f64 / secs / 1024.0
                } else {
                    0.0
                };
                info!(
                    filename,
                    archive_id = %archive_id,
                    secs,
                    kib_per_sec,
                    "Upload complete"
                );
                Some(archive_id)
            }
            Err(err) => {
                info!(
                    directory = %directory.display(),
                    filename,
                    error = %err,
                    "Upload failed"
                );
                self.stats
                    .add_error(directory, filename, ErrorKind::Upload, error_report(&err));
                None
            }
        }
    }

    /// Names of the regular files directly inside `directory`, sorted.
    ///
    /// Symlinks count as the entry they point to. Entries that cannot be stat'ed or
    /// whose names are not UTF-8 are recorded as errored and left out.
    fn list_candidate_files(&mut self, directory: &Path) -> Result<Vec<String>, BackupError> {
        let entries = fs::read_dir(directory).map_err(|source| BackupError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let mut names = Vec::new();
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        dir = %directory.display(),
                        error = %err,
                        "Failed to read directory entry"
                    );
                    continue;
                }
            };
            let path = entry.path();
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    let lossy = raw.to_string_lossy().into_owned();
                    warn!(path = %path.display(), "Cannot back up file with non UTF-8 name");
                    self.stats.add_error(
                        directory,
                        &lossy,
                        ErrorKind::UnsupportedName,
                        "filename is not valid UTF-8",
                    );
                    continue;
                }
            };
            if is_store_file(&name) {
                continue;
            }
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => names.push(name),
                Ok(_) => debug!(path = %path.display(), "Ignoring non-file entry"),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to stat entry");
                    self.stats
                        .add_error(directory, &name, ErrorKind::Stat, err.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn record_store_error(
        &mut self,
        directory: &Path,
        filename: &str,
        err: MetadataError,
    ) -> BackupError {
        let kind = if err.is_stat_error() {
            ErrorKind::Stat
        } else {
            ErrorKind::Storage
        };
        self.stats
            .add_error(directory, filename, kind, error_report(&err));
        BackupError::Metadata(err)
    }
}

impl<T: UploadTransport> Drop for BackupOrchestrator<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn assert_directory_contract(directory: &Path) {
    assert!(
        directory.is_absolute(),
        "directory must be absolute: {}",
        directory.display()
    );
    assert!(
        directory.is_dir(),
        "directory must exist and be a directory: {}",
        directory.display()
    );
}

fn assert_file_contract(directory: &Path, filename: &str) {
    assert_directory_contract(directory);
    assert!(
        validate_filename(filename).is_ok(),
        "filename must be a plain name: {filename:?}"
    );
    let full = directory.join(filename);
    assert!(
        full.is_file(),
        "filename must be an existing regular file: {}",
        full.display()
    );
}
