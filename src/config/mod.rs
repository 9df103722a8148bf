//! TOML configuration for backup runs.
//!
//! Config keys: `include_extensions`, `exclude_extensions`, `vault_dir`, `dry_run`.
//! Command line flags override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_dirs;
use crate::backup::{BackupSettings, InclusionFilter, filter::normalize_extensions};

mod errors;

pub use errors::ConfigError;

/// Default filename used to store the configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Settings loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Back up only these extensions.
    #[serde(default)]
    pub include_extensions: Vec<String>,
    /// Back up everything except these extensions.
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    /// Destination of the local vault transport.
    #[serde(default)]
    pub vault_dir: Option<PathBuf>,
    #[serde(default)]
    pub dry_run: bool,
}

impl BackupConfig {
    /// Normalize extension lists the same way the filter compares them.
    pub fn normalized(self) -> Self {
        Self {
            include_extensions: normalize_extensions(&self.include_extensions)
                .into_iter()
                .collect(),
            exclude_extensions: normalize_extensions(&self.exclude_extensions)
                .into_iter()
                .collect(),
            ..self
        }
    }

    /// Build the inclusion filter, rejecting configs that set both lists.
    pub fn filter(&self) -> Result<InclusionFilter, ConfigError> {
        match (
            self.include_extensions.is_empty(),
            self.exclude_extensions.is_empty(),
        ) {
            (false, false) => Err(ConfigError::ConflictingFilters),
            (false, true) => Ok(InclusionFilter::include_only(&self.include_extensions)),
            (true, false) => Ok(InclusionFilter::exclude(&self.exclude_extensions)),
            (true, true) => Ok(InclusionFilter::allow_all()),
        }
    }

    pub fn settings(&self) -> Result<BackupSettings, ConfigError> {
        Ok(BackupSettings {
            filter: self.filter()?,
            dry_run: self.dry_run,
        })
    }

    /// Vault directory, required unless the run is a dry run.
    pub fn require_vault_dir(&self) -> Result<&Path, ConfigError> {
        self.vault_dir.as_deref().ok_or(ConfigError::MissingVault)
    }
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app directory, returning defaults if missing.
pub fn load_or_default() -> Result<BackupConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from `path`, returning defaults if the file does not exist.
pub fn load_from(path: &Path) -> Result<BackupConfig, ConfigError> {
    if !path.exists() {
        return Ok(BackupConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(BackupConfig::normalized)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &BackupConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ExtensionRule;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, BackupConfig::default());
        assert_eq!(config.filter().unwrap(), InclusionFilter::allow_all());
    }

    #[test]
    fn load_normalizes_extensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "include_extensions = [\".JPG\", \" png \", \"\"]\nvault_dir = \"/vault\"\n",
        )
        .unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.include_extensions, vec!["jpg", "png"]);
        assert_eq!(config.require_vault_dir().unwrap(), Path::new("/vault"));
        assert!(matches!(config.filter().unwrap().rule(), ExtensionRule::Include(_)));
    }

    #[test]
    fn both_lists_are_a_configuration_error() {
        let config = BackupConfig {
            include_extensions: vec!["jpg".into()],
            exclude_extensions: vec!["png".into()],
            ..BackupConfig::default()
        };
        assert!(matches!(config.filter(), Err(ConfigError::ConflictingFilters)));
        assert!(matches!(config.settings(), Err(ConfigError::ConflictingFilters)));
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "dry_run = \"maybe\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { path: ref p, .. } if *p == path));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = BackupConfig {
            exclude_extensions: vec!["avi".into(), "mov".into()],
            vault_dir: Some(PathBuf::from("/mnt/cold")),
            dry_run: true,
            ..BackupConfig::default()
        };
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn missing_vault_is_reported() {
        let config = BackupConfig::default();
        assert!(matches!(
            config.require_vault_dir(),
            Err(ConfigError::MissingVault)
        ));
    }
}
