//! void-sweep - Resumable Empty Directory Cleanup
//!
//! Finds empty directories in large trees and removes them safely. Every
//! discovered directory is recorded in a SQLite catalog, so a scan that is
//! interrupted can pick up where it stopped.
//!
//! # Features
//!
//! - **Parallel Scanning**: A fixed pool of worker threads lists one
//!   directory each, with a bounded number of tasks in flight.
//!
//! - **Resumable**: The catalog is committed on a timer (and on demand);
//!   a resumed session re-validates and reloads its pending directories.
//!
//! - **Safe Removal**: Each candidate is re-listed twice right before
//!   removal, and only `remove_dir` is used, never a recursive delete.
//!   Nothing is removed unless delete mode is on.
//!
//! - **Symlink Aware**: Symbolic links and junctions are never followed
//!   and never counted as content.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         SweepEngine                              │
//! │              (create or resume session, run phases)              │
//! └───────────────┬───────────────────────────────────┬─────────────┘
//!                 │ scan                              │ cleanup
//!                 ▼                                   ▼
//! ┌───────────────────────────────┐   ┌───────────────────────────────┐
//! │       ScanCoordinator         │   │        CleanupEngine          │
//! │  ┌────────┐ ┌────────┐        │   │  deepest-first candidates     │
//! │  │Worker 1│ │Worker N│  ...   │   │  guard A: listing             │
//! │  └───┬────┘ └───┬────┘        │   │  guard B: second listing      │
//! │      ▼          ▼             │   │  remove_dir / WOULD_DELETE    │
//! │   ┌──────────────────┐        │   └───────────────┬───────────────┘
//! │   │ Frontier BFS/DFS │        │                   │
//! │   └──────────────────┘        │                   │
//! └───────────────┬───────────────┘                   │
//!                 ▼                                   ▼
//!        ┌─────────────────────────────────────────────────┐
//!        │      Catalog (SQLite, WAL, single writer)        │
//!        │        sessions  ·  folders                      │
//!        └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Dry run: mark empty directories as WOULD_DELETE
//! void-sweep /data/archive
//!
//! # Remove them, 16 workers, never touching depth 0 or 1
//! void-sweep /data/archive --delete -w 16 --min-depth 2
//!
//! # Continue after Ctrl-C
//! void-sweep --resume --delete
//!
//! # Inspect results
//! sqlite3 void_sweep.db "SELECT path FROM folders WHERE status = 'WOULD_DELETE'"
//! ```

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod progress;
pub mod walker;

pub use catalog::{Catalog, FolderStatus};
pub use cleanup::{CleanupEngine, CleanupReport};
pub use config::{CliArgs, Strategy, SweepConfig};
pub use engine::{SweepEngine, SweepResult};
pub use error::{Result, SweepError};
pub use walker::{ScanControl, ScanCoordinator, ScanSummary};
