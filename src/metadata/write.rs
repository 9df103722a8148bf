use rusqlite::{OptionalExtension, params};

use crate::model::{ArchiveId, FileFingerprint};

use super::record::{MetadataRecord, decode, encode};
use super::util::{map_sql_error, validate_filename};
use super::{MetadataDatabase, MetadataError};

impl MetadataDatabase {
    /// Store a successful upload of `filename`.
    ///
    /// An existing record keeps its history: the previous archive id is appended to
    /// `old_archive_ids` before being replaced. Returns the superseded id, if any.
    pub fn record_upload(
        &self,
        filename: &str,
        fingerprint: FileFingerprint,
        archive_id: &ArchiveId,
    ) -> Result<Option<ArchiveId>, MetadataError> {
        let filename = validate_filename(filename)?;
        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        let existing: Option<String> = tx
            .prepare_cached("SELECT record FROM file_records WHERE filename = ?1")
            .map_err(map_sql_error)?
            .query_row(params![filename], |row| row.get(0))
            .optional()
            .map_err(map_sql_error)?;
        let (record, superseded) = match existing {
            Some(text) => {
                let mut record = decode(filename, &text)?;
                let previous = record.supersede(fingerprint, archive_id.clone());
                (record, Some(previous))
            }
            None => (
                MetadataRecord::first_upload(fingerprint, archive_id.clone()),
                None,
            ),
        };
        write_record(&tx, filename, &record)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(superseded)
    }

    /// Overwrite the record for `filename` as-is.
    pub fn put_record(&self, filename: &str, record: &MetadataRecord) -> Result<(), MetadataError> {
        let filename = validate_filename(filename)?;
        write_record(&self.connection, filename, record)
    }
}

fn write_record(
    connection: &rusqlite::Connection,
    filename: &str,
    record: &MetadataRecord,
) -> Result<(), MetadataError> {
    let text = encode(record)?;
    connection
        .prepare_cached(
            "INSERT INTO file_records (filename, record) VALUES (?1, ?2)
             ON CONFLICT(filename) DO UPDATE SET record = excluded.record",
        )
        .map_err(map_sql_error)?
        .execute(params![filename, text])
        .map_err(map_sql_error)?;
    Ok(())
}
