//! Upload transports.
//!
//! The orchestrator only needs an opaque archive identifier on success and an error
//! it can report on failure. How and where the bytes are stored is up to the transport.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::ArchiveId;

mod local_vault;

pub use local_vault::{LocalVaultTransport, VaultEntryDescription};

/// Errors an upload transport can report.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading the source or writing the destination failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The remote side refused the upload.
    #[error("Upload rejected: {0}")]
    Rejected(String),
    /// Any other transport-specific failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Stores one file and returns the identifier of the stored archive.
pub trait UploadTransport {
    /// Upload `directory/filename`. Blocks until the upload completes or fails.
    fn upload(&mut self, directory: &Path, filename: &str) -> Result<ArchiveId, TransportError>;

    /// Release any connection held by the transport.
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: UploadTransport + ?Sized> UploadTransport for Box<T> {
    fn upload(&mut self, directory: &Path, filename: &str) -> Result<ArchiveId, TransportError> {
        (**self).upload(directory, filename)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}

/// Render an error together with its chain of sources, one cause per line.
pub fn error_report(err: &(dyn std::error::Error + 'static)) -> String {
    let mut report = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        report.push_str("\ncaused by: ");
        report.push_str(&cause.to_string());
        source = cause.source();
    }
    report
}
