//! Durable catalog of sessions and discovered folders
//!
//! Backed by SQLite. Every discovered directory gets a row keyed by
//! `(path, session_id)`; its status moves from PENDING to SCANNED or
//! ERROR during the scan, and to DELETED or WOULD_DELETE during cleanup.
//! Resume reloads the PENDING rows of the last incomplete session.

pub mod models;
pub mod schema;
mod store;

pub use models::{CatalogStats, FolderRecord, FolderStatus, Session};
pub use store::Catalog;
