mod support;

use std::path::PathBuf;

use frostbak::app_dirs::{self, APP_DIR_NAME};
use frostbak::config::{self, BackupConfig, CONFIG_FILE_NAME};
use support::frostbak_env::FrostbakEnvGuard;
use tempfile::tempdir;

#[test]
fn config_lives_under_overridden_home() {
    let home = tempdir().unwrap();
    let _guard = FrostbakEnvGuard::set_config_home(home.path().to_path_buf());

    let path = config::config_path().unwrap();
    assert_eq!(path, home.path().join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    assert_eq!(config::load_or_default().unwrap(), BackupConfig::default());

    let saved = BackupConfig {
        include_extensions: vec!["raw".into()],
        vault_dir: Some(PathBuf::from("/mnt/vault")),
        ..BackupConfig::default()
    };
    config::save_to_path(&saved, &path).unwrap();
    assert_eq!(config::load_or_default().unwrap(), saved);

    let logs = app_dirs::logs_dir().unwrap();
    assert_eq!(logs, home.path().join(APP_DIR_NAME).join("logs"));
    assert!(logs.is_dir());
}
