//! Where frostbak keeps its own files.
//!
//! `config.toml` and `logs/` live in a `.frostbak` folder under the OS config
//! directory, or under `$FROSTBAK_CONFIG_HOME` when that variable is set.

use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Folder created under the config root.
pub const APP_DIR_NAME: &str = ".frostbak";
/// Environment variable that replaces the OS config root.
pub const CONFIG_HOME_ENV: &str = "FROSTBAK_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    /// Neither `FROSTBAK_CONFIG_HOME` nor an OS config directory is available.
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The `.frostbak` folder, created on demand.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_home().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// `.frostbak/logs`, created on demand.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join(LOGS_DIR_NAME))
}

fn config_home() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_HOME_ENV) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()),
    }
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
