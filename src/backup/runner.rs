use std::{path::PathBuf, thread};

use tracing::{debug, warn};

use crate::transport::UploadTransport;

use super::errors::BackupError;
use super::orchestrator::{BackupOrchestrator, BackupSettings};
use super::stats::RunStatistics;

/// Spawn a thread that backs up `directories` in order with its own orchestrator.
pub fn backup_in_background<T>(
    directories: Vec<PathBuf>,
    settings: BackupSettings,
    transport: T,
) -> thread::JoinHandle<Result<RunStatistics, BackupError>>
where
    T: UploadTransport + Send + 'static,
{
    thread::spawn(move || {
        let mut orchestrator = BackupOrchestrator::new(settings, transport);
        for directory in &directories {
            orchestrator.process_directory(directory)?;
        }
        Ok(orchestrator.finish())
    })
}

/// Results of a parallel run: merged statistics of every worker that finished, and
/// the directories whose worker failed.
#[derive(Debug, Default)]
pub struct ParallelBackup {
    pub stats: RunStatistics,
    pub failures: Vec<(PathBuf, BackupError)>,
}

/// Back up each directory on its own thread and merge the results.
///
/// Every directory gets an independent orchestrator and transport, so no metadata
/// database is ever shared between threads. All workers are joined before returning,
/// so a failing directory never hides the work done for the others.
pub fn backup_directories_in_parallel<T, F>(
    directories: Vec<PathBuf>,
    settings: &BackupSettings,
    mut make_transport: F,
) -> ParallelBackup
where
    T: UploadTransport + Send + 'static,
    F: FnMut() -> T,
{
    let handles: Vec<_> = directories
        .into_iter()
        .map(|directory| {
            debug!(directory = %directory.display(), "Spawning backup worker");
            let handle =
                backup_in_background(vec![directory.clone()], settings.clone(), make_transport());
            (directory, handle)
        })
        .collect();
    let mut result = ParallelBackup::default();
    for (directory, handle) in handles {
        match join_backup(handle) {
            Ok(stats) => result.stats.merge(stats),
            Err(err) => {
                warn!(directory = %directory.display(), error = %err, "Backup worker failed");
                result.failures.push((directory, err));
            }
        }
    }
    result
}

/// Wait for a background backup, turning a worker panic into an error.
pub fn join_backup(
    handle: thread::JoinHandle<Result<RunStatistics, BackupError>>,
) -> Result<RunStatistics, BackupError> {
    handle.join().map_err(|_| BackupError::WorkerPanicked)?
}
