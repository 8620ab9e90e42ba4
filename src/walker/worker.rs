//! Worker thread logic for the parallel scan
//!
//! Each worker:
//! - Receives one directory at a time from the coordinator
//! - Lists its direct entries, counting files and subdirectories
//! - Records newly discovered subdirectories and pushes them to the frontier
//! - Records the final entry count in the catalog
//! - Reports the outcome back to the coordinator

use crate::catalog::Catalog;
use crate::error::{CatalogResult, ScanOutcome, WorkerError};
use crate::filter::FolderFilter;
use crate::progress::{ProgressSink, ScanCounters};
use crate::walker::frontier::{Frontier, WorkItem};
use crossbeam_channel::{Receiver, Sender};
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// Outcome of one task as seen by the coordinator
pub type TaskResult = Result<ScanOutcome, WorkerError>;

/// Everything a worker needs to scan a directory
pub struct ScanContext {
    pub session_id: String,
    pub catalog: Arc<Catalog>,
    pub frontier: Arc<Frontier>,
    pub filter: FolderFilter,
    pub counters: Arc<ScanCounters>,
    pub progress: Arc<dyn ProgressSink>,
}

/// A worker thread that processes directory tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: Arc<ScanContext>,
        tasks: Receiver<WorkItem>,
        results: Sender<TaskResult>,
    ) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("sweep-{}", id))
            .spawn(move || worker_loop(id, ctx, tasks, results))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop; exits when the coordinator drops the task sender
fn worker_loop(
    id: usize,
    ctx: Arc<ScanContext>,
    tasks: Receiver<WorkItem>,
    results: Sender<TaskResult>,
) {
    debug!(worker = id, "Worker starting");
    let mut processed = 0u64;

    for item in tasks.iter() {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| scan_directory(&item, &ctx))) {
            Ok(outcome) => {
                log_outcome(id, &outcome);
                Ok(outcome)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                // Leave no reachable directory without a final status
                record_failure(&ctx, &item.path, item.depth, &format!("worker panicked: {}", message));
                Err(WorkerError::Panicked { id, message })
            }
        };
        processed += 1;

        if results.send(result).is_err() {
            break;
        }
    }

    debug!(worker = id, dirs = processed, "Worker shutting down");
}

fn log_outcome(id: usize, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Scanned { path, entries, .. } => {
            trace!(worker = id, path = %path, entries = entries, "Directory scanned");
        }
        ScanOutcome::Skipped { path, reason } => {
            debug!(worker = id, path = %path, reason = %reason, "Directory skipped");
        }
        ScanOutcome::Failed { path, error } => {
            warn!(worker = id, path = %path, error = %error, "Directory failed");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Scan a single directory.
///
/// Never returns an error: listing failures are recorded against the
/// directory and reported as [`ScanOutcome::Failed`].
pub fn scan_directory(item: &WorkItem, ctx: &ScanContext) -> ScanOutcome {
    // Symlinks and junctions are never followed. Windows junctions report
    // as symlinks through `symlink_metadata`.
    match fs::symlink_metadata(&item.path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            return ScanOutcome::Skipped {
                path: item.path.clone(),
                reason: "symbolic link or junction".into(),
            };
        }
        Ok(_) => {}
        Err(e) => {
            // Let the listing below decide whether this is an error
            debug!(path = %item.path, error = %e, "Could not check link status");
        }
    }

    ctx.progress.current_path(&item.path);
    ctx.progress.queue_depth(ctx.frontier.size());

    let dir = match fs::read_dir(&item.path) {
        Ok(dir) => dir,
        Err(e) => return fail(ctx, item, &e),
    };

    let mut entries = 0u64;
    let mut subdirs = 0u64;
    let mut bytes = 0u64;

    for entry in dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => return fail(ctx, item, &e),
        };
        let child_path = entry.path().to_string_lossy().into_owned();

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                record_failure(ctx, &child_path, item.depth + 1, &io_message(&e));
                continue;
            }
        };

        if file_type.is_symlink() {
            continue;
        }

        if file_type.is_file() {
            entries += 1;
            // Informational only
            if let Ok(meta) = entry.metadata() {
                bytes += meta.len();
            }
        } else if file_type.is_dir() {
            entries += 1;
            subdirs += 1;

            let name = entry.file_name();
            let child = item.child(child_path);
            if !ctx
                .filter
                .is_filtered(&child.path, &name.to_string_lossy(), child.depth as usize)
            {
                // The row must exist before any worker can pop the item
                persist(
                    ctx,
                    &child.path,
                    ctx.catalog.add_folder(&ctx.session_id, &child.path, child.depth),
                );
                let size = ctx.frontier.push(child);
                ctx.progress.queue_depth(size);
            }
        }
    }

    persist(
        ctx,
        &item.path,
        ctx.catalog.record_scanned(&ctx.session_id, &item.path, entries),
    );

    let empty = entries == 0;
    ctx.counters.record_scanned(empty);
    ctx.counters.record_bytes(bytes);
    ctx.progress.scanned();
    if empty {
        ctx.progress.empty_found();
    }
    ctx.progress.bytes_processed(bytes);

    ScanOutcome::Scanned {
        path: item.path.clone(),
        entries,
        subdirs,
    }
}

fn fail(ctx: &ScanContext, item: &WorkItem, err: &io::Error) -> ScanOutcome {
    let message = io_message(err);
    record_failure(ctx, &item.path, item.depth, &message);
    ScanOutcome::Failed {
        path: item.path.clone(),
        error: message,
    }
}

fn record_failure(ctx: &ScanContext, path: &str, depth: u32, message: &str) {
    persist(
        ctx,
        path,
        ctx.catalog.record_error(&ctx.session_id, path, depth, message),
    );
    ctx.counters.record_error();
    ctx.progress.error();
}

fn io_message(err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::PermissionDenied {
        "Access Denied".to_string()
    } else {
        err.to_string()
    }
}

/// Catalog write failures degrade resumability, never the scan
fn persist(ctx: &ScanContext, path: &str, result: CatalogResult<()>) {
    if let Err(e) = result {
        ctx.counters.record_durability_error();
        error!(path = %path, error = %e, "Catalog write failed");
    }
}
