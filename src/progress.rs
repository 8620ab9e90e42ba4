//! Progress reporting for scan and cleanup
//!
//! The engine reports through [`ProgressSink`], which worker threads call
//! directly. Implementations must be cheap and must never block: the
//! console reporter only bumps atomics, and a separate ticker thread
//! renders them with indicatif.

use crate::cleanup::CleanupReport;
use crate::walker::ScanSummary;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Coarse phase of a run, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Scanning = 0,
    Draining = 1,
    Cleanup = 2,
    Complete = 3,
    Cancelled = 4,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Phase::Scanning,
            1 => Phase::Draining,
            2 => Phase::Cleanup,
            3 => Phase::Complete,
            _ => Phase::Cancelled,
        }
    }
}

/// Thread-safe progress callbacks. Every method defaults to a no-op.
pub trait ProgressSink: Send + Sync {
    /// One directory listed
    fn scanned(&self) {}

    /// One directory found with no entries
    fn empty_found(&self) {}

    /// One per-item failure
    fn error(&self) {}

    /// One directory removed (or marked, in simulation mode)
    fn deleted(&self) {}

    /// Directory a worker just started on
    fn current_path(&self, _path: &str) {}

    /// Frontier size
    fn queue_depth(&self, _depth: usize) {}

    /// File bytes seen in one directory listing
    fn bytes_processed(&self, _bytes: u64) {}

    fn phase(&self, _phase: Phase) {}
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {}

/// Aggregate scan totals, one atomic per metric
#[derive(Debug, Default)]
pub struct ScanCounters {
    scanned: AtomicU64,
    empty: AtomicU64,
    errors: AtomicU64,
    bytes: AtomicU64,
    durability_errors: AtomicU64,
}

/// Point-in-time copy of [`ScanCounters`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub scanned: u64,
    pub empty: u64,
    pub errors: u64,
    pub bytes: u64,
    pub durability_errors: u64,
}

impl ScanCounters {
    pub fn record_scanned(&self, empty: bool) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.empty.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// A catalog write or commit failed
    pub fn record_durability_error(&self) {
        self.durability_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            scanned: self.scanned.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            durability_errors: self.durability_errors.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the sink methods and the ticker thread
#[derive(Default)]
struct ConsoleState {
    scanned: AtomicU64,
    empty: AtomicU64,
    errors: AtomicU64,
    deleted: AtomicU64,
    bytes: AtomicU64,
    queue: AtomicUsize,
    phase: AtomicU8,
    current: Mutex<String>,
}

/// Spinner display on stderr
pub struct ConsoleProgress {
    bar: ProgressBar,
    state: Arc<ConsoleState>,
    stop: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleProgress {
    /// Create the spinner and start its refresh thread
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        let state = Arc::new(ConsoleState::default());
        let stop = Arc::new(AtomicBool::new(false));

        let ticker = {
            let bar = bar.clone();
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("progress".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        bar.set_message(render(&state));
                        thread::sleep(Duration::from_millis(200));
                    }
                })
                .ok()
        };

        Self {
            bar,
            state,
            stop,
            ticker: Mutex::new(ticker),
        }
    }

    /// Stop refreshing and erase the spinner
    pub fn finish_and_clear(&self) {
        self.stop_ticker();
        self.bar.finish_and_clear();
    }

    fn stop_ticker(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.ticker.lock().take() {
            if handle.join().is_err() {
                debug!("Progress ticker panicked");
            }
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

impl ProgressSink for ConsoleProgress {
    fn scanned(&self) {
        self.state.scanned.fetch_add(1, Ordering::Relaxed);
    }

    fn empty_found(&self) {
        self.state.empty.fetch_add(1, Ordering::Relaxed);
    }

    fn error(&self) {
        self.state.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn deleted(&self) {
        self.state.deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn current_path(&self, path: &str) {
        // Contended updates are simply dropped
        if let Some(mut current) = self.state.current.try_lock() {
            current.clear();
            current.push_str(path);
        }
    }

    fn queue_depth(&self, depth: usize) {
        self.state.queue.store(depth, Ordering::Relaxed);
    }

    fn bytes_processed(&self, bytes: u64) {
        self.state.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn phase(&self, phase: Phase) {
        self.state.phase.store(phase as u8, Ordering::Relaxed);
    }
}

fn render(state: &ConsoleState) -> String {
    let load = |v: &AtomicU64| format_number(v.load(Ordering::Relaxed));
    match Phase::from_u8(state.phase.load(Ordering::Relaxed)) {
        Phase::Cleanup => format!(
            "Cleanup | Removed: {} | Errors: {}",
            load(&state.deleted),
            load(&state.errors),
        ),
        phase => {
            let current = state
                .current
                .try_lock()
                .map(|p| truncate_path(&p, 60))
                .unwrap_or_default();
            format!(
                "{} | Scanned: {} | Empty: {} | Errors: {} | Queue: {} | Size: {} | {}",
                match phase {
                    Phase::Draining => "Draining",
                    Phase::Complete => "Complete",
                    Phase::Cancelled => "Cancelled",
                    _ => "Scanning",
                },
                load(&state.scanned),
                load(&state.empty),
                load(&state.errors),
                format_number(state.queue.load(Ordering::Relaxed) as u64),
                format_size(state.bytes.load(Ordering::Relaxed), BINARY),
                current,
            )
        }
    }
}

/// Keep the tail of long paths
fn truncate_path(path: &str, max: usize) -> String {
    let count = path.chars().count();
    if count <= max {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - max + 3).collect();
    format!("...{}", tail)
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print the banner at the start of a run
pub fn print_header(root: &str, workers: usize, catalog: &str, delete_mode: bool) {
    println!();
    println!(
        "{} {}",
        style("void-sweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Catalog:").bold(), catalog);
    if delete_mode {
        println!("  {} {}", style("Mode:").bold(), style("DELETE").red().bold());
    } else {
        println!("  {} dry run", style("Mode:").bold());
    }
    println!();
}

/// Print scan totals
pub fn print_scan_summary(summary: &ScanSummary, session_id: &str) {
    let secs = summary.duration.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.scanned as f64 / secs
    } else {
        0.0
    };

    println!();
    if summary.completed {
        println!("{}", style("Scan Complete").green().bold());
    } else {
        println!("{}", style("Scan Interrupted").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Session:").bold(), session_id);
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(summary.scanned)
    );
    println!("  {} {}", style("Empty:").bold(), format_number(summary.empty));
    println!(
        "  {} {}",
        style("File Size:").bold(),
        format_size(summary.bytes, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} dirs/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
    if summary.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(summary.errors)
        );
    }
    if summary.durability_errors > 0 {
        println!(
            "  {} {} (resume may repeat work)",
            style("Catalog write failures:").red().bold(),
            format_number(summary.durability_errors)
        );
    }
    if !summary.completed {
        println!(
            "  {} {} (continue with --resume)",
            style("Pending:").bold(),
            format_number(summary.pending_remaining as u64)
        );
    }
    println!();
}

/// Print cleanup totals
pub fn print_cleanup_summary(report: &CleanupReport, delete_mode: bool) {
    println!("{}", style("Cleanup").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Candidates:").bold(),
        format_number(report.candidates)
    );
    if delete_mode {
        println!(
            "  {} {}",
            style("Deleted:").bold(),
            format_number(report.deleted)
        );
    } else {
        println!(
            "  {} {}",
            style("Would delete:").bold(),
            format_number(report.would_delete)
        );
    }
    let skipped = report.skipped_missing + report.skipped_non_empty;
    if skipped > 0 {
        println!("  {} {}", style("Skipped:").bold(), format_number(skipped));
    }
    if report.safety_failures + report.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(report.safety_failures + report.failed)
        );
    }
    println!();
}

/// Print up to `limit` recorded errors
pub fn print_errors(errors: &[(String, String)], limit: usize) {
    if errors.is_empty() {
        return;
    }
    println!(
        "{} ({} total)",
        style("Errors").yellow().bold(),
        format_number(errors.len() as u64)
    );
    for (path, message) in errors.iter().take(limit) {
        println!("  {} {}", style(path).dim(), message);
    }
    if errors.len() > limit {
        println!("  ... and {} more", format_number((errors.len() - limit) as u64));
    }
    println!();
}
