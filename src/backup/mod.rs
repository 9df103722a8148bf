//! Incremental backup decisions and post-upload reconciliation.

mod errors;
pub mod filter;
mod orchestrator;
mod runner;
pub mod stats;

pub use errors::BackupError;
pub use filter::{ExtensionRule, InclusionFilter};
pub use orchestrator::{BackupOrchestrator, BackupSettings, FileDecision};
pub use runner::{
    ParallelBackup, backup_directories_in_parallel, backup_in_background, join_backup,
};
pub use stats::{ErrorKind, ExclusionReason, FileError, FileOutcome, RunStatistics};
