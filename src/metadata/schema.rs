use rusqlite::{Connection, OptionalExtension, params};

use super::MetadataError;
use super::util::map_sql_error;

/// Current layout of the per-directory database.
pub(super) const SCHEMA_VERSION: i64 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

pub(super) fn apply_schema(connection: &Connection) -> Result<(), MetadataError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
             CREATE TABLE IF NOT EXISTS file_records (
                filename TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );",
        )
        .map_err(map_sql_error)?;
    ensure_schema_version(connection)
}

fn ensure_schema_version(connection: &Connection) -> Result<(), MetadataError> {
    let stored: Option<String> = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sql_error)?;
    match stored {
        None => {
            connection
                .execute(
                    "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
                    params![SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string()],
                )
                .map_err(map_sql_error)?;
            Ok(())
        }
        Some(value) => match value.parse::<i64>() {
            Ok(version) if (1..=SCHEMA_VERSION).contains(&version) => Ok(()),
            _ => Err(MetadataError::UnsupportedSchema(value)),
        },
    }
}
