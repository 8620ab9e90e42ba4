//! Parallel directory scan
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────┐
//!                     │     ScanCoordinator      │
//!                     │  - owns in-flight count  │
//!                     │  - checkpoints catalog   │
//!                     └──┬────────────────────▲──┘
//!              WorkItem  │                    │  TaskResult
//!           (bounded)    ▼                    │  (bounded)
//!       ┌──────────────┬─────────────┬────────┴─────┐
//!       │              │             │              │
//! ┌─────▼─────┐  ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │  │  Worker 2 │     ...     │  Worker N │
//! │  read_dir │  │  read_dir │             │  read_dir │
//! └─────┬─────┘  └─────┬─────┘             └─────┬─────┘
//!       │ children     │                         │
//!       ▼              ▼                         ▼
//!   ┌────────────────────┐            ┌──────────────────┐
//!   │ Frontier (mutex)   │            │ Catalog (mutex)  │
//!   │ BFS front/DFS back │            │ single writer    │
//!   └────────────────────┘            └──────────────────┘
//! ```

pub mod coordinator;
pub mod frontier;
pub mod worker;

pub use coordinator::{ScanControl, ScanCoordinator, ScanState, ScanSummary, StartMode};
pub use frontier::{Frontier, WorkItem};
pub use worker::{scan_directory, ScanContext, Worker};
