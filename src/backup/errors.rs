use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::MetadataError;

/// Errors that can occur while backing up a directory.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The metadata store failed for one file.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    /// Listing the directory failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Directory that could not be listed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The run was canceled between two files.
    #[error("Backup canceled")]
    Canceled,
    /// A background worker panicked.
    #[error("Backup worker panicked")]
    WorkerPanicked,
}
