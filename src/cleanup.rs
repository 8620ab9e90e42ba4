//! Empty directory cleanup
//!
//! Runs after a scan has completed. Candidates come from a single
//! catalog query (scanned, zero entries, deepest first); each one is
//! re-checked on disk twice before anything is removed, and removal
//! itself uses `remove_dir`, which the OS refuses on a non-empty
//! directory.
//!
//! Emptiness created by this pass (a parent whose only child was just
//! removed) is not re-evaluated; a later run picks it up.

use crate::catalog::Catalog;
use crate::error::{CatalogResult, Result};
use crate::progress::{Phase, ProgressSink};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Totals of one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Candidates considered, root excluded
    pub candidates: u64,

    /// Directories removed (delete mode)
    pub deleted: u64,

    /// Directories marked WOULD_DELETE (simulation mode)
    pub would_delete: u64,

    /// Candidates that no longer exist
    pub skipped_missing: u64,

    /// Candidates that gained content since the scan
    pub skipped_non_empty: u64,

    /// Second listing disagreed with the first
    pub safety_failures: u64,

    /// Verification or removal failed at the OS level
    pub failed: u64,

    /// Catalog status updates or the final commit failed
    pub durability_errors: u64,
}

/// Why a candidate was not acted on
enum Verdict {
    Empty,
    Missing,
    NotEmpty(usize),
    SafetyFailure(usize),
    Failed(String),
}

/// Removes (or marks) empty directories found by a scan
pub struct CleanupEngine {
    catalog: Arc<Catalog>,
    session_id: String,
    root: String,
    min_depth: usize,
    delete_mode: bool,
    progress: Arc<dyn ProgressSink>,
}

impl CleanupEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        session_id: impl Into<String>,
        root: impl Into<String>,
        min_depth: usize,
        delete_mode: bool,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            catalog,
            session_id: session_id.into(),
            root: root.into(),
            min_depth,
            delete_mode,
            progress,
        }
    }

    /// Run one pass over the candidates
    pub fn run(&self) -> Result<CleanupReport> {
        self.progress.phase(Phase::Cleanup);
        let candidates = self
            .catalog
            .empty_candidates(&self.session_id, self.min_depth)?;

        info!(
            session = %self.session_id,
            candidates = candidates.len(),
            delete = self.delete_mode,
            "Cleanup started"
        );

        let mut report = CleanupReport::default();
        for path in candidates.iter().filter(|p| **p != self.root) {
            report.candidates += 1;
            self.process(path, &mut report);
        }

        if let Err(e) = self.catalog.commit() {
            report.durability_errors += 1;
            error!(error = %e, "Failed to commit cleanup results");
        }

        info!(
            deleted = report.deleted,
            would_delete = report.would_delete,
            skipped = report.skipped_missing + report.skipped_non_empty,
            failed = report.failed + report.safety_failures,
            "Cleanup finished"
        );
        Ok(report)
    }

    fn process(&self, path: &str, report: &mut CleanupReport) {
        match verify_empty(Path::new(path)) {
            Verdict::Empty => {}
            Verdict::Missing => {
                debug!(path = %path, "Candidate no longer exists");
                report.skipped_missing += 1;
                return;
            }
            Verdict::NotEmpty(items) => {
                warn!(path = %path, items, "Skipped: directory is no longer empty");
                report.skipped_non_empty += 1;
                return;
            }
            Verdict::SafetyFailure(items) => {
                error!(path = %path, items, "Safety check failed: directory not empty");
                report.safety_failures += 1;
                self.progress.error();
                return;
            }
            Verdict::Failed(reason) => {
                error!(path = %path, error = %reason, "Could not verify directory");
                report.failed += 1;
                self.progress.error();
                return;
            }
        }

        if self.delete_mode {
            if let Err(e) = fs::remove_dir(path) {
                error!(path = %path, error = %e, "Cannot delete directory");
                report.failed += 1;
                self.progress.error();
                return;
            }
            report.deleted += 1;
            self.record(path, self.catalog.mark_deleted(&self.session_id, path), report);
        } else {
            report.would_delete += 1;
            self.record(
                path,
                self.catalog.mark_would_delete(&self.session_id, path),
                report,
            );
        }
        self.progress.deleted();
    }

    fn record(&self, path: &str, result: CatalogResult<()>, report: &mut CleanupReport) {
        if let Err(e) = result {
            report.durability_errors += 1;
            error!(path = %path, error = %e, "Failed to record cleanup status");
        }
    }
}

/// Two independent listings must both come back empty
fn verify_empty(path: &Path) -> Verdict {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        // Replaced by a file or a link since the scan
        Ok(_) => return Verdict::NotEmpty(0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Verdict::Missing,
        Err(e) => return Verdict::Failed(e.to_string()),
    }

    // Guard A: anything at all in the listing
    match fs::read_dir(path) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Verdict::NotEmpty(1 + entries.count());
            }
        }
        Err(e) => return Verdict::Failed(e.to_string()),
    }

    // Guard B: a fresh enumeration, counting every entry it can see
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => return Verdict::Failed(e.to_string()),
    };
    let mut items = 0usize;
    for entry in entries {
        match entry {
            Ok(_) => items += 1,
            Err(e) => return Verdict::Failed(e.to_string()),
        }
    }
    if items > 0 {
        return Verdict::SafetyFailure(items);
    }

    Verdict::Empty
}
