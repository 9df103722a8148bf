//! Versioned JSON encoding of per-file upload records.

use serde::{Deserialize, Serialize};

use crate::model::{ArchiveId, FileFingerprint};

use super::MetadataError;

/// Upload history for one filename inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Fingerprint captured when the last successful upload was decided.
    pub fingerprint: FileFingerprint,
    /// Identifier returned by the most recent successful upload.
    pub archive_id: ArchiveId,
    /// Superseded identifiers, oldest first.
    pub old_archive_ids: Vec<ArchiveId>,
}

impl MetadataRecord {
    /// Record a first successful upload.
    pub fn first_upload(fingerprint: FileFingerprint, archive_id: ArchiveId) -> Self {
        Self {
            fingerprint,
            archive_id,
            old_archive_ids: Vec::new(),
        }
    }

    /// Replace the current upload, pushing the previous archive id onto the history.
    ///
    /// Returns the superseded id.
    pub fn supersede(&mut self, fingerprint: FileFingerprint, archive_id: ArchiveId) -> ArchiveId {
        let previous = std::mem::replace(&mut self.archive_id, archive_id);
        self.old_archive_ids.push(previous.clone());
        self.fingerprint = fingerprint;
        previous
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "format")]
enum StoredRecord {
    #[serde(rename = "v1")]
    V1(StoredRecordV1),
}

#[derive(Serialize, Deserialize)]
struct StoredRecordV1 {
    archive_id: ArchiveId,
    stats: StoredStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    old_archive_ids: Vec<ArchiveId>,
}

#[derive(Serialize, Deserialize)]
struct StoredStats {
    size: u64,
    mtime_ns: i64,
}

pub(super) fn encode(record: &MetadataRecord) -> Result<String, MetadataError> {
    let stored = StoredRecord::V1(StoredRecordV1 {
        archive_id: record.archive_id.clone(),
        stats: StoredStats {
            size: record.fingerprint.size,
            mtime_ns: record.fingerprint.mtime_ns,
        },
        old_archive_ids: record.old_archive_ids.clone(),
    });
    serde_json::to_string(&stored).map_err(MetadataError::Encode)
}

pub(super) fn decode(filename: &str, text: &str) -> Result<MetadataRecord, MetadataError> {
    let stored: StoredRecord =
        serde_json::from_str(text).map_err(|source| MetadataError::Decode {
            filename: filename.to_string(),
            source,
        })?;
    match stored {
        StoredRecord::V1(v1) => Ok(MetadataRecord {
            fingerprint: FileFingerprint::new(v1.stats.size, v1.stats.mtime_ns),
            archive_id: v1.archive_id,
            old_archive_ids: v1.old_archive_ids,
        }),
    }
}
