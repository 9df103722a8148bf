use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info, warn};

use crate::model::ArchiveId;

use super::{TransportError, UploadTransport};

/// Sidecar written next to every archive stored in a vault directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntryDescription {
    /// Absolute path the archive was uploaded from.
    pub source: PathBuf,
    /// Bytes copied into the vault.
    pub size: u64,
    /// RFC 3339 upload timestamp.
    pub uploaded_at: String,
}

/// Transport that archives files into a local (or mounted) vault directory.
///
/// Every upload becomes a new archive named by a random id, so re-uploading a file
/// never overwrites an earlier archive.
#[derive(Debug)]
pub struct LocalVaultTransport {
    vault_dir: PathBuf,
}

impl LocalVaultTransport {
    /// Use `vault_dir` as the archive destination, creating it if needed.
    pub fn new(vault_dir: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let vault_dir = vault_dir.into();
        fs::create_dir_all(&vault_dir).map_err(|source| TransportError::Io {
            path: vault_dir.clone(),
            source,
        })?;
        Ok(Self { vault_dir })
    }

    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    /// Path of the stored archive for `id`.
    pub fn archive_path(&self, id: &ArchiveId) -> PathBuf {
        self.vault_dir.join(id.as_str())
    }

    /// Read back the sidecar description for `id`.
    pub fn describe(&self, id: &ArchiveId) -> Result<VaultEntryDescription, TransportError> {
        let path = self.description_path(id);
        let bytes = fs::read(&path).map_err(|source| TransportError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|err| TransportError::Other(Box::new(err)))
    }

    fn description_path(&self, id: &ArchiveId) -> PathBuf {
        self.vault_dir.join(format!("{id}.json"))
    }
}

impl UploadTransport for LocalVaultTransport {
    fn upload(&mut self, directory: &Path, filename: &str) -> Result<ArchiveId, TransportError> {
        let id = ArchiveId::generate();
        self.store(&directory.join(filename), &id)?;
        Ok(id)
    }
}

impl LocalVaultTransport {
    /// Copy `source` into the vault as archive `id` and write its description.
    ///
    /// Either both files end up in the vault or neither does.
    fn store(&self, source: &Path, id: &ArchiveId) -> Result<(), TransportError> {
        let destination = self.archive_path(id);
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Copying file into vault"
        );
        let started = Instant::now();
        let size = fs::copy(source, &destination).map_err(|err| TransportError::Io {
            path: source.to_path_buf(),
            source: err,
        })?;
        if let Err(err) = self.write_description(source, size, id) {
            if let Err(remove_err) = fs::remove_file(&destination) {
                warn!(
                    path = %destination.display(),
                    error = %remove_err,
                    "Failed to remove archive without description"
                );
            }
            return Err(err);
        }
        info!(
            archive_id = %id,
            bytes = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stored archive in vault"
        );
        Ok(())
    }

    fn write_description(
        &self,
        source: &Path,
        size: u64,
        id: &ArchiveId,
    ) -> Result<(), TransportError> {
        let description = VaultEntryDescription {
            source: source.to_path_buf(),
            size,
            uploaded_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .map_err(|err| TransportError::Other(Box::new(err)))?,
        };
        let text = serde_json::to_string_pretty(&description)
            .map_err(|err| TransportError::Other(Box::new(err)))?;
        let path = self.description_path(id);
        fs::write(&path, text).map_err(|source| TransportError::Io { path, source })
    }
}
