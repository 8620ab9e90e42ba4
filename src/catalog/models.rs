//! Catalog row types

use crate::config::SweepConfig;
use crate::error::CatalogError;
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a folder row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderStatus {
    /// Discovered, not yet listed
    Pending,
    /// Listed; `entry_count` is authoritative
    Scanned,
    /// Listing or stat failed
    Error,
    /// Removed by the cleanup pass
    Deleted,
    /// Would have been removed (simulation mode)
    WouldDelete,
}

impl FolderStatus {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderStatus::Pending => "PENDING",
            FolderStatus::Scanned => "SCANNED",
            FolderStatus::Error => "ERROR",
            FolderStatus::Deleted => "DELETED",
            FolderStatus::WouldDelete => "WOULD_DELETE",
        }
    }
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FolderStatus::Pending),
            "SCANNED" => Ok(FolderStatus::Scanned),
            "ERROR" => Ok(FolderStatus::Error),
            "DELETED" => Ok(FolderStatus::Deleted),
            "WOULD_DELETE" => Ok(FolderStatus::WouldDelete),
            other => Err(CatalogError::UnknownStatus(other.to_string())),
        }
    }
}

/// One discovered folder within one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub path: String,
    pub session_id: String,
    pub depth: u32,
    /// Direct files and subdirectories, symlinks excluded. -1 until scanned.
    pub entry_count: i64,
    pub status: FolderStatus,
    pub error_message: Option<String>,
}

impl FolderRecord {
    /// Scanned with no entries
    pub fn is_empty(&self) -> bool {
        self.status == FolderStatus::Scanned && self.entry_count == 0
    }
}

/// One run
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// RFC 3339 timestamp
    pub started_at: String,
    /// Configuration the run started with
    pub config: SweepConfig,
    pub root_path: String,
    pub completed: bool,
}

/// Per-session row counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub total: u64,
    pub pending: u64,
    pub scanned: u64,
    /// Scanned with `entry_count == 0`
    pub empty: u64,
    pub errors: u64,
    pub deleted: u64,
    pub would_delete: u64,
}
