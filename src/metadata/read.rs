use rusqlite::{OptionalExtension, params};

use super::record::{MetadataRecord, decode};
use super::util::{map_sql_error, validate_filename};
use super::{MetadataDatabase, MetadataError};

impl MetadataDatabase {
    /// Fetch the upload record for `filename`, if one was ever committed.
    pub fn get_record(&self, filename: &str) -> Result<Option<MetadataRecord>, MetadataError> {
        let filename = validate_filename(filename)?;
        let text: Option<String> = self
            .connection
            .prepare_cached("SELECT record FROM file_records WHERE filename = ?1")
            .map_err(map_sql_error)?
            .query_row(params![filename], |row| row.get(0))
            .optional()
            .map_err(map_sql_error)?;
        text.map(|text| decode(filename, &text)).transpose()
    }

    /// Fetch every record in the store, ordered by filename.
    pub fn list_records(&self) -> Result<Vec<(String, MetadataRecord)>, MetadataError> {
        let mut stmt = self
            .connection
            .prepare("SELECT filename, record FROM file_records ORDER BY filename ASC")
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        rows.into_iter()
            .map(|(filename, text)| {
                let record = decode(&filename, &text)?;
                Ok((filename, record))
            })
            .collect()
    }

    /// Count committed records.
    pub fn count_records(&self) -> Result<usize, MetadataError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM file_records", [], |row| row.get(0))
            .map_err(map_sql_error)?;
        Ok(count.max(0) as usize)
    }
}
