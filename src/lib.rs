//! Incremental per-directory backups to cold storage.
//!
//! Each backed-up directory carries a hidden SQLite database remembering, for every
//! file that was uploaded, its size, modification time and archive identifier. A file
//! is uploaded again only when its size or modification time changed.
//!
//! The fingerprint is deliberately weak: a content change that preserves both the size
//! and the nanosecond modification time is not detected.

/// Config and log directory resolution.
pub mod app_dirs;
/// Filtering, orchestration and run statistics.
pub mod backup;
/// TOML configuration.
pub mod config;
/// Tracing setup.
pub mod logging;
/// Per-directory metadata databases.
pub mod metadata;
/// Shared value types.
pub mod model;
/// Upload transports.
pub mod transport;
