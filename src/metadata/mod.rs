//! Per-directory fingerprint metadata.
//!
//! Every backed-up directory owns a hidden SQLite database mapping plain filenames to
//! their last successful upload. A record exists only once an upload of that file has
//! succeeded; absence means the file was never uploaded from this directory.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;

/// Read-only queries.
pub mod read;
/// Versioned record encoding.
pub mod record;
/// Schema management for metadata databases.
pub mod schema;
/// Scoped handle that keeps one database open at a time.
pub mod store;
/// Filename validation and error mapping.
pub mod util;
/// Record mutations.
pub mod write;

pub use record::MetadataRecord;
pub use store::{CommitOutcome, Inclusion, MetadataStore};
pub use util::{is_store_file, validate_filename};

/// Hidden filename used for per-directory databases.
pub const METADATA_FILE_NAME: &str = ".frostbak.db";
/// Prefix shared by the database and any SQLite sidecar files.
pub const METADATA_RESERVED_PREFIX: &str = ".frostbak";

/// Errors returned by the metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The provided directory does not exist or is not a directory.
    #[error("Backup folder is not a directory: {0}")]
    InvalidDirectory(PathBuf),
    /// Record keys must be plain filenames.
    #[error("Not a plain filename: {0:?}")]
    InvalidFilename(String),
    /// The file could not be stat'ed.
    #[error("Failed to stat {path}: {source}")]
    Stat {
        /// Path that failed to stat.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// SQLite query failed.
    #[error("Metadata query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// A stored record could not be parsed.
    #[error("Corrupt metadata record for {filename}: {source}")]
    Decode {
        /// Key of the unreadable record.
        filename: String,
        /// JSON parse error.
        source: serde_json::Error,
    },
    /// A record could not be serialized.
    #[error("Failed to encode metadata record: {0}")]
    Encode(serde_json::Error),
    /// The database was written by a newer schema.
    #[error("Unsupported metadata schema version {0}")]
    UnsupportedSchema(String),
    /// Database is locked or busy.
    #[error("Metadata database is busy, please retry")]
    Busy,
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
}

impl MetadataError {
    /// True when the failure came from reading the file on disk rather than the database.
    pub fn is_stat_error(&self) -> bool {
        matches!(self, Self::Stat { .. })
    }
}

/// SQLite wrapper that stores upload records for a single directory.
pub struct MetadataDatabase {
    connection: Connection,
    directory: PathBuf,
}

impl MetadataDatabase {
    /// Open (or create) the database that lives inside `directory`.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(MetadataError::InvalidDirectory(directory.to_path_buf()));
        }
        let connection = Connection::open(database_path_for(directory))?;
        let db = Self {
            connection,
            directory: directory.to_path_buf(),
        };
        db.apply_pragmas()?;
        schema::apply_schema(&db.connection)?;
        Ok(db)
    }

    /// Return the directory this database describes.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Close the connection, surfacing any error SQLite reports while flushing.
    pub fn close(self) -> Result<(), MetadataError> {
        self.connection
            .close()
            .map_err(|(_, err)| util::map_sql_error(err))
    }

    fn apply_pragmas(&self) -> Result<(), MetadataError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=DELETE;
             PRAGMA synchronous=FULL;
             PRAGMA busy_timeout=5000;",
            )
            .map_err(util::map_sql_error)
    }
}

/// Location of the metadata database for `directory`.
pub fn database_path_for(directory: &Path) -> PathBuf {
    directory.join(METADATA_FILE_NAME)
}
