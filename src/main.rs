//! Command line entry point: back up one or more directories into a vault.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use frostbak::backup::{BackupOrchestrator, backup_in_background, join_backup};
use frostbak::config::{self, BackupConfig, ConfigError};
use frostbak::logging::{self, LogLevel};
use frostbak::metadata::{MetadataDatabase, database_path_for, validate_filename};
use frostbak::model::ArchiveId;
use frostbak::transport::{LocalVaultTransport, TransportError, UploadTransport, error_report};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode, String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(ExitCode::SUCCESS);
    };
    if let Err(err) = logging::init(options.log_level) {
        eprintln!("Logging disabled: {err}");
    }

    let directories = options
        .directories
        .iter()
        .map(|dir| absolute_directory(dir))
        .collect::<Result<Vec<_>, _>>()?;

    if options.show_metadata {
        for directory in &directories {
            print_metadata(directory)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&options).map_err(|err| err.to_string())?;
    let settings = config.settings().map_err(|err| err.to_string())?;
    let transport = build_transport(&config).map_err(|err| err.to_string())?;

    let stats = match &options.one_file {
        Some(filename) => {
            let [directory] = directories.as_slice() else {
                return Err("--one-file needs exactly one directory".to_string());
            };
            validate_filename(filename).map_err(|err| err.to_string())?;
            if !directory.join(filename).is_file() {
                return Err(format!(
                    "Not a regular file: {}",
                    directory.join(filename).display()
                ));
            }
            let mut orchestrator = BackupOrchestrator::new(settings, transport);
            if let Err(err) = orchestrator.process_file(directory, filename) {
                tracing::warn!(filename, error = %err, "File not backed up");
            }
            orchestrator.finish()
        }
        None => join_backup(backup_in_background(directories, settings, transport))
            .map_err(|err| error_report(&err))?,
    };

    print!("{}", stats.render_summary());
    if stats.error_count > 0 {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliOptions {
    directories: Vec<PathBuf>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    vault_dir: Option<PathBuf>,
    dry_run: bool,
    one_file: Option<String>,
    show_metadata: bool,
    config_path: Option<PathBuf>,
    log_level: LogLevel,
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--include" => {
                idx += 1;
                options.include = Some(split_list(required_value(&args, idx, "--include")?));
            }
            "--exclude" => {
                idx += 1;
                options.exclude = Some(split_list(required_value(&args, idx, "--exclude")?));
            }
            "--vault" => {
                idx += 1;
                options.vault_dir = Some(PathBuf::from(required_value(&args, idx, "--vault")?));
            }
            "--config" => {
                idx += 1;
                options.config_path =
                    Some(PathBuf::from(required_value(&args, idx, "--config")?));
            }
            "--one-file" => {
                idx += 1;
                options.one_file = Some(required_value(&args, idx, "--one-file")?.to_string());
            }
            "--dry-run" => options.dry_run = true,
            "--show-metadata" => options.show_metadata = true,
            "--info" => options.log_level = LogLevel::Info,
            "--debug" => options.log_level = LogLevel::Debug,
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            directory => options.directories.push(PathBuf::from(directory)),
        }
        idx += 1;
    }

    if options.include.is_some() && options.exclude.is_some() {
        return Err("Can't use --include and --exclude at the same time".to_string());
    }
    if options.directories.is_empty() {
        return Err(format!("At least one directory is required\n\n{}", help_text()));
    }
    Ok(Some(options))
}

fn required_value<'a>(args: &'a [String], idx: usize, flag: &str) -> Result<&'a str, String> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn help_text() -> String {
    [
        "frostbak",
        "",
        "Usage:",
        "  frostbak [options] <directory>...",
        "",
        "Options:",
        "  --include a,b        Back up only these extensions",
        "  --exclude a,b        Back up everything except these extensions",
        "  --vault DIR          Vault directory receiving uploads",
        "  --dry-run            Report what would be uploaded without uploading",
        "  --one-file NAME      Back up a single file of the (only) directory",
        "  --show-metadata      Print stored records instead of backing up",
        "  --config PATH        Read settings from PATH instead of the default config",
        "  --info | --debug     Increase log verbosity",
        "  -h, --help           Show this help",
    ]
    .join("\n")
}

/// Merge the config file with command line overrides.
fn load_config(options: &CliOptions) -> Result<BackupConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => config::load_from(path)?,
        None => config::load_or_default()?,
    };
    if let Some(include) = &options.include {
        config.include_extensions = include.clone();
        config.exclude_extensions.clear();
    }
    if let Some(exclude) = &options.exclude {
        config.exclude_extensions = exclude.clone();
        config.include_extensions.clear();
    }
    if let Some(vault_dir) = &options.vault_dir {
        config.vault_dir = Some(vault_dir.clone());
    }
    config.dry_run |= options.dry_run;
    Ok(config.normalized())
}

fn build_transport(
    config: &BackupConfig,
) -> Result<Box<dyn UploadTransport + Send>, String> {
    if config.dry_run && config.vault_dir.is_none() {
        return Ok(Box::new(NoUploads));
    }
    let vault_dir = config.require_vault_dir().map_err(|err| err.to_string())?;
    let transport = LocalVaultTransport::new(vault_dir).map_err(|err| error_report(&err))?;
    Ok(Box::new(transport))
}

/// Stand-in for dry runs without a configured vault; never reached by the orchestrator.
struct NoUploads;

impl UploadTransport for NoUploads {
    fn upload(&mut self, _: &Path, filename: &str) -> Result<ArchiveId, TransportError> {
        Err(TransportError::Rejected(format!(
            "no vault configured for {filename}"
        )))
    }
}

fn absolute_directory(path: &Path) -> Result<PathBuf, String> {
    let absolute = std::path::absolute(path)
        .map_err(|err| format!("Invalid directory {}: {err}", path.display()))?;
    if !absolute.is_dir() {
        return Err(format!("Not a directory: {}", absolute.display()));
    }
    Ok(absolute)
}

fn print_metadata(directory: &Path) -> Result<(), String> {
    println!("{}", directory.display());
    if !database_path_for(directory).exists() {
        println!("  (no metadata)");
        return Ok(());
    }
    let db = MetadataDatabase::open(directory).map_err(|err| error_report(&err))?;
    let records = db.list_records().map_err(|err| error_report(&err))?;
    for (filename, record) in &records {
        println!(
            "  {filename}: size={} mtime_ns={} archive={} previous={}",
            record.fingerprint.size,
            record.fingerprint.mtime_ns,
            record.archive_id,
            record.old_archive_ids.len()
        );
    }
    db.close().map_err(|err| error_report(&err))
}
