//! Scan coordinator - orchestrates the parallel directory scan
//!
//! The coordinator is responsible for:
//! - Seeding the frontier (fresh root, or pending rows on resume)
//! - Submitting work to the pool within the in-flight bound
//! - Reaping results and detecting completion
//! - Periodic and manual checkpoints
//! - Pause and cancel handling
//!
//! It is the only thread that submits work or reaps results, so the
//! completion test (empty frontier and nothing in flight) cannot race
//! with a submission. Workers push children before reporting back, so
//! an in-flight directory always keeps the scan alive until its
//! children are visible in the frontier.

use crate::catalog::Catalog;
use crate::config::SweepConfig;
use crate::error::{Result, WorkerError};
use crate::filter::FolderFilter;
use crate::progress::{Phase, ProgressSink, ScanCounters};
use crate::walker::frontier::{Frontier, WorkItem};
use crate::walker::worker::{ScanContext, TaskResult, Worker};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long the coordinator waits for a result before re-checking flags
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Init,
    Scanning,
    /// No new submissions; waiting for in-flight work
    Draining,
    /// Frontier exhausted; session marked complete
    Complete,
    /// Stopped early; remaining work stays PENDING
    Cancelled,
}

/// Flags shared with whoever drives the scan (signal handler, UI, tests)
#[derive(Debug)]
pub struct ScanControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
    checkpoint_requested: AtomicBool,
    state: Mutex<ScanState>,
}

impl Default for ScanControl {
    fn default() -> Self {
        Self {
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            checkpoint_requested: AtomicBool::new(false),
            state: Mutex::new(ScanState::Init),
        }
    }
}

impl ScanControl {
    /// Stop submitting new work; in-flight directories still finish
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn unpause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Drain in-flight work and stop; unvisited directories stay pending
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Commit the catalog on the next coordinator iteration
    pub fn request_checkpoint(&self) {
        self.checkpoint_requested.store(true, Ordering::SeqCst);
    }

    fn take_checkpoint_request(&self) -> bool {
        self.checkpoint_requested.swap(false, Ordering::SeqCst)
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock() = state;
    }
}

/// How the frontier is seeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Start from the configured root
    Fresh,
    /// Reload the session's pending rows
    Resume,
}

/// Result of a scan phase
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Directories listed successfully
    pub scanned: u64,

    /// Scanned directories with no entries
    pub empty: u64,

    /// Per-item failures
    pub errors: u64,

    /// File bytes seen (informational)
    pub bytes: u64,

    /// Catalog writes or commits that failed
    pub durability_errors: u64,

    /// Time taken for the scan
    pub duration: Duration,

    /// Whether the frontier drained (vs was cancelled)
    pub completed: bool,

    /// Items left in the frontier at exit
    pub pending_remaining: usize,
}

/// Coordinates the parallel scan of one session
pub struct ScanCoordinator {
    config: Arc<SweepConfig>,
    catalog: Arc<Catalog>,
    session_id: String,
    progress: Arc<dyn ProgressSink>,
    control: Arc<ScanControl>,
    counters: Arc<ScanCounters>,
}

impl ScanCoordinator {
    /// Create a coordinator for `session_id`
    pub fn new(
        config: Arc<SweepConfig>,
        catalog: Arc<Catalog>,
        session_id: impl Into<String>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            catalog,
            session_id: session_id.into(),
            progress,
            control: Arc::new(ScanControl::default()),
            counters: Arc::new(ScanCounters::default()),
        }
    }

    /// Share an existing control handle
    pub fn with_control(mut self, control: Arc<ScanControl>) -> Self {
        self.control = control;
        self
    }

    /// Handle for pause/cancel/checkpoint (clone into signal handlers)
    pub fn control(&self) -> Arc<ScanControl> {
        Arc::clone(&self.control)
    }

    /// Live totals
    pub fn counters(&self) -> Arc<ScanCounters> {
        Arc::clone(&self.counters)
    }

    pub fn state(&self) -> ScanState {
        self.control.state()
    }

    /// Run the scan until the frontier drains or the scan is cancelled
    pub fn run(&self, mode: StartMode) -> Result<ScanSummary> {
        let start = Instant::now();
        self.control.set_state(ScanState::Init);

        let frontier = Arc::new(Frontier::new(self.config.strategy));
        self.seed(&frontier, mode)?;

        let capacity = self.config.in_flight_capacity();
        let (task_tx, task_rx) = bounded::<WorkItem>(capacity);
        let (result_tx, result_rx) = bounded::<TaskResult>(capacity);

        let ctx = Arc::new(ScanContext {
            session_id: self.session_id.clone(),
            catalog: Arc::clone(&self.catalog),
            frontier: Arc::clone(&frontier),
            filter: FolderFilter::new(&self.config)?,
            counters: Arc::clone(&self.counters),
            progress: Arc::clone(&self.progress),
        });

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            workers.push(Worker::spawn(
                id,
                Arc::clone(&ctx),
                task_rx.clone(),
                result_tx.clone(),
            )?);
        }
        drop(task_rx);
        drop(result_tx);

        info!(
            root = %self.config.root_path.display(),
            session = %self.session_id,
            workers = workers.len(),
            strategy = %self.config.strategy,
            pending = frontier.size(),
            "Scan started"
        );
        self.control.set_state(ScanState::Scanning);
        self.progress.phase(Phase::Scanning);

        let interval = self.config.checkpoint_interval();
        let mut last_checkpoint = Instant::now();
        let mut in_flight = 0usize;
        let mut pool_lost = false;
        let mut cancelled = false;

        loop {
            if self.control.is_cancelled() {
                info!("Cancel requested, draining in-flight work");
                cancelled = true;
                break;
            }

            if !self.control.is_paused() {
                while in_flight < capacity {
                    let Some(item) = frontier.pop() else { break };
                    if task_tx.send(item.clone()).is_err() {
                        // Put it back so it is not lost from this run's view
                        frontier.push(item);
                        pool_lost = true;
                        break;
                    }
                    in_flight += 1;
                }
            }

            if in_flight == 0 && frontier.is_empty() {
                break;
            }
            if pool_lost {
                error!(error = %WorkerError::TaskChannelClosed, "Worker pool is gone");
                break;
            }

            match result_rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    in_flight -= 1;
                    self.reap(result);
                    while let Ok(result) = result_rx.try_recv() {
                        in_flight -= 1;
                        self.reap(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!(in_flight, "All workers exited unexpectedly");
                    pool_lost = true;
                    break;
                }
            }
            self.progress.queue_depth(frontier.size());

            let manual = self.control.take_checkpoint_request();
            if manual || last_checkpoint.elapsed() >= interval {
                self.checkpoint(&frontier, manual);
                last_checkpoint = Instant::now();
            }
        }

        self.control.set_state(ScanState::Draining);
        self.progress.phase(Phase::Draining);
        drop(task_tx);
        self.drain(&result_rx, in_flight);

        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed to join cleanly");
            }
        }

        let completed = !pool_lost && !cancelled && frontier.is_empty();
        self.checkpoint(&frontier, false);

        if completed {
            if let Err(e) = self.catalog.mark_session_complete(&self.session_id) {
                self.counters.record_durability_error();
                error!(session = %self.session_id, error = %e, "Failed to mark session complete");
            }
            self.control.set_state(ScanState::Complete);
            self.progress.phase(Phase::Complete);
        } else {
            self.control.set_state(ScanState::Cancelled);
            self.progress.phase(Phase::Cancelled);
        }

        let totals = self.counters.snapshot();
        let summary = ScanSummary {
            scanned: totals.scanned,
            empty: totals.empty,
            errors: totals.errors,
            bytes: totals.bytes,
            durability_errors: totals.durability_errors,
            duration: start.elapsed(),
            completed,
            pending_remaining: frontier.size(),
        };

        info!(
            scanned = summary.scanned,
            empty = summary.empty,
            errors = summary.errors,
            completed = summary.completed,
            duration_secs = summary.duration.as_secs(),
            "Scan finished"
        );
        Ok(summary)
    }

    /// Fill the frontier before any worker exists
    fn seed(&self, frontier: &Frontier, mode: StartMode) -> Result<()> {
        match mode {
            StartMode::Fresh => {
                let root = self.config.root_key();
                self.catalog.add_folder(&self.session_id, &root, 0)?;
                self.catalog.commit()?;
                frontier.push(WorkItem::root(root));
            }
            StartMode::Resume => {
                let removed = self.catalog.invalidate_missing(&self.session_id)?;
                let pending = self.catalog.pending(&self.session_id)?;
                info!(
                    session = %self.session_id,
                    pending = pending.len(),
                    invalidated = removed,
                    "Resuming scan"
                );
                frontier.extend(pending);
            }
        }
        Ok(())
    }

    /// Workers already counted and recorded the failure; only log it here
    fn reap(&self, result: TaskResult) {
        if let Err(e) = result {
            error!(error = %e, "Scan task failed");
        }
    }

    fn drain(&self, results: &Receiver<TaskResult>, mut in_flight: usize) {
        while in_flight > 0 {
            match results.recv() {
                Ok(result) => {
                    in_flight -= 1;
                    self.reap(result);
                }
                Err(_) => break,
            }
        }
        debug!("In-flight work drained");
    }

    fn checkpoint(&self, frontier: &Frontier, manual: bool) {
        match self.catalog.commit() {
            Ok(()) => {
                let scanned = self.counters.snapshot().scanned;
                if manual {
                    info!(scanned, pending = frontier.size(), "Checkpoint saved");
                } else {
                    debug!(scanned, pending = frontier.size(), "Checkpoint committed");
                }
            }
            Err(e) => {
                self.counters.record_durability_error();
                error!(error = %e, "Checkpoint commit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FolderStatus;
    use crate::progress::SilentProgress;
    use std::fs;
    use std::thread;
    use tempfile::tempdir;

    /// Panics whenever a worker starts on a directory named `explode`
    struct PanicOnExplode;

    impl ProgressSink for PanicOnExplode {
        fn current_path(&self, path: &str) {
            if std::path::Path::new(path).file_name() == Some(std::ffi::OsStr::new("explode")) {
                panic!("sink failure on {}", path);
            }
        }
    }

    fn coordinator(root: &std::path::Path, workers: usize) -> (ScanCoordinator, Arc<Catalog>, String) {
        let mut config = SweepConfig::new(root);
        config.workers = workers;
        config.validate().unwrap();
        let catalog = Arc::new(Catalog::open_in_memory().unwrap());
        let session = catalog.create_session(&config).unwrap();
        let coordinator = ScanCoordinator::new(
            Arc::new(config),
            Arc::clone(&catalog),
            session.id.clone(),
            Arc::new(SilentProgress),
        );
        (coordinator, catalog, session.id)
    }

    #[test]
    fn test_scan_completes() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/file"), b"x").unwrap();

        let (coordinator, catalog, session) = coordinator(dir.path(), 4);
        let summary = coordinator.run(StartMode::Fresh).unwrap();

        assert!(summary.completed);
        assert_eq!(summary.scanned, 5);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.pending_remaining, 0);
        assert_eq!(coordinator.state(), ScanState::Complete);

        let stats = catalog.stats(&session).unwrap();
        assert_eq!(stats.scanned, 5);
        assert_eq!(stats.pending, 0);
        assert!(catalog.session(&session).unwrap().unwrap().completed);
    }

    #[test]
    fn test_cancel_before_run_leaves_root_pending() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let (coordinator, catalog, session) = coordinator(dir.path(), 2);
        coordinator.control().cancel();
        let summary = coordinator.run(StartMode::Fresh).unwrap();

        assert!(!summary.completed);
        assert_eq!(summary.scanned, 0);
        assert_eq!(summary.pending_remaining, 1);
        assert_eq!(coordinator.state(), ScanState::Cancelled);

        let pending = catalog.pending(&session).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].depth, 0);
        assert!(!catalog.session(&session).unwrap().unwrap().completed);
    }

    #[test]
    fn test_resume_finishes_pending() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();

        let (first, catalog, session) = coordinator(dir.path(), 2);
        first.control().cancel();
        first.run(StartMode::Fresh).unwrap();

        let config = Arc::new(catalog.session(&session).unwrap().unwrap().config);
        let second = ScanCoordinator::new(
            config,
            Arc::clone(&catalog),
            session.clone(),
            Arc::new(SilentProgress),
        );
        let summary = second.run(StartMode::Resume).unwrap();

        assert!(summary.completed);
        assert_eq!(summary.scanned, 3);
        let folders = catalog.folders(&session).unwrap();
        assert!(folders.iter().all(|f| f.status == FolderStatus::Scanned));
    }

    #[test]
    fn test_worker_panic_counted_once() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("explode")).unwrap();
        fs::create_dir(dir.path().join("good")).unwrap();

        let mut config = SweepConfig::new(dir.path());
        config.workers = 1;
        config.validate().unwrap();
        let catalog = Arc::new(Catalog::open_in_memory().unwrap());
        let session = catalog.create_session(&config).unwrap();
        let coordinator = ScanCoordinator::new(
            Arc::new(config),
            Arc::clone(&catalog),
            session.id.clone(),
            Arc::new(PanicOnExplode),
        );

        let summary = coordinator.run(StartMode::Fresh).unwrap();
        assert!(summary.completed);
        assert_eq!(summary.scanned, 2);

        let errors = catalog.errors(&session.id).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(summary.errors, errors.len() as u64);

        let exploded = catalog
            .folders(&session.id)
            .unwrap()
            .into_iter()
            .find(|f| f.path.ends_with("explode"))
            .unwrap();
        assert_eq!(exploded.status, FolderStatus::Error);
        assert!(exploded.error_message.unwrap().contains("panicked"));
    }

    #[test]
    fn test_paused_scan_waits_for_unpause() {
        let dir = tempdir().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                fs::create_dir_all(dir.path().join(format!("d{}/e{}", i, j))).unwrap();
            }
        }

        let (coordinator, catalog, session) = coordinator(dir.path(), 2);
        let control = coordinator.control();
        let counters = coordinator.counters();
        control.pause();

        let handle = thread::spawn(move || coordinator.run(StartMode::Fresh));
        thread::sleep(Duration::from_millis(200));
        assert_eq!(counters.snapshot().scanned, 0);
        assert_eq!(control.state(), ScanState::Scanning);

        control.unpause();
        let summary = handle.join().unwrap().unwrap();

        assert!(summary.completed);
        assert_eq!(summary.scanned, 21);
        assert_eq!(catalog.stats(&session).unwrap().pending, 0);
    }

    #[test]
    fn test_manual_checkpoint_request_is_consumed() {
        let control = ScanControl::default();
        control.request_checkpoint();
        assert!(control.take_checkpoint_request());
        assert!(!control.take_checkpoint_request());
    }

    #[test]
    fn test_pause_flags() {
        let control = ScanControl::default();
        assert!(!control.is_paused());
        control.pause();
        assert!(control.is_paused());
        control.unpause();
        assert!(!control.is_paused());
        assert_eq!(control.state(), ScanState::Init);
    }
}
