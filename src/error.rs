//! Error types shared by the scan, execute and backup stages.
//!
//! Per-entry problems are never reported through these types: they end up as
//! skipped entries, move failures or restore failures inside the result
//! structures. These errors cover the cases where nothing (or nothing more)
//! can be attempted.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a scan or an execution as a whole.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root path does not exist, is not a directory, or cannot be listed.
    #[error("Invalid root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// The scan options contradict each other.
    #[error("Conflicting options: {0}")]
    ConflictingOptions(String),

    /// The exclusion rules could not be compiled.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The background worker went away before reporting a result.
    #[error("Worker thread terminated unexpectedly")]
    WorkerLost,
}

/// Errors raised while reading or writing the backup catalog.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Filesystem failure on the catalog directory or a record file.
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record file exists but cannot be parsed.
    #[error("Malformed backup {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// No record with this identifier exists in the catalog.
    #[error("Backup not found: {0}")]
    NotFound(String),

    /// The record could not be serialized.
    #[error("Failed to serialize backup: {0}")]
    Serialize(#[from] serde_json::Error),
}
