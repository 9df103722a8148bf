use std::path::{Component, Path};

use super::{METADATA_FILE_NAME, METADATA_RESERVED_PREFIX, MetadataError};

/// Translate rusqlite errors into friendlier MetadataError variants.
pub(super) fn map_sql_error(err: rusqlite::Error) -> MetadataError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            MetadataError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => MetadataError::Unexpected,
        other => MetadataError::Sql(other),
    }
}

/// Validate that a record key is a plain filename inside the store's directory.
///
/// Rejects empty names, `.`/`..`, and anything with more than one path component.
pub fn validate_filename(filename: &str) -> Result<&str, MetadataError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == filename => Ok(filename),
        _ => Err(MetadataError::InvalidFilename(filename.to_string())),
    }
}

/// True when `filename` belongs to the store's own bookkeeping.
pub fn is_store_file(filename: &str) -> bool {
    filename == METADATA_FILE_NAME || filename.starts_with(METADATA_RESERVED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_filename_accepts_plain_names() {
        assert_eq!(validate_filename("photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(validate_filename(".hidden").unwrap(), ".hidden");
    }

    #[test]
    fn validate_filename_rejects_paths_and_special_names() {
        for name in ["", ".", "..", "nested/file.txt", "/abs.txt", "./file.txt"] {
            let err = validate_filename(name).unwrap_err();
            assert!(
                matches!(err, MetadataError::InvalidFilename(_)),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn store_files_cover_database_and_sidecars() {
        assert!(is_store_file(".frostbak.db"));
        assert!(is_store_file(".frostbak.db-journal"));
        assert!(is_store_file(".frostbak-anything"));
        assert!(!is_store_file("frostbak.db"));
        assert!(!is_store_file("notes.txt"));
    }
}
