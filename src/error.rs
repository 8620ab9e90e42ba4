//! Error types for void-sweep
//!
//! This module defines the error hierarchy that covers:
//! - Catalog (SQLite) errors
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Per-directory failures are not errors at this level. They are reported
//! as [`ScanOutcome::Failed`] and recorded against the folder in the catalog,
//! so a bad directory never aborts a worker or the run.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for void-sweep
#[derive(Error, Debug)]
pub enum SweepError {
    /// Catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resume requested but nothing to resume
    #[error("No incomplete session found to resume")]
    NothingToResume,

    /// Cleanup-only requested but no scan ever finished
    #[error("No completed session found to clean up")]
    NothingToClean,

    /// Cleanup requested for a session whose scan never finished
    #[error("Session '{0}' has not completed its scan phase")]
    ScanIncomplete(String),
}

/// Catalog (durable store) errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Config (de)serialization for the session row
    #[error("Session config serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to open or create the catalog file
    #[error("Failed to open catalog at '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A status string in the database that we do not know
    #[error("Unknown folder status '{0}'")]
    UnknownStatus(String),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// min_depth above max_depth, or max_depth above the hard limit
    #[error("Invalid depth range {min}..={max}: {reason}")]
    InvalidDepthRange {
        min: usize,
        max: usize,
        reason: String,
    },

    /// Invalid glob pattern
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Root path missing, unreadable or not a directory
    #[error("Invalid root path '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Catalog path cannot be created
    #[error("Invalid catalog path '{path}': {reason}")]
    InvalidCatalogPath { path: PathBuf, reason: String },

    /// A root path is required unless resuming
    #[error("A root path is required for a new scan")]
    MissingRoot,

    /// --resume and an explicit path were both given
    #[error("Cannot specify a root path with --resume; it is loaded from the session")]
    ResumeWithPath,
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Task channel closed while work was still being submitted
    #[error("Task channel closed unexpectedly")]
    TaskChannelClosed,
}

/// Result type alias for SweepError
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for CatalogError
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Represents the outcome of scanning a single directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Directory listed and recorded as SCANNED
    Scanned {
        path: String,
        entries: u64,
        subdirs: u64,
    },

    /// Not scanned on purpose (symlink, junction)
    Skipped { path: String, reason: String },

    /// Listing failed; recorded as ERROR
    Failed { path: String, error: String },
}
