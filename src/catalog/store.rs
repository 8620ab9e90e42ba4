//! Single-writer catalog facade
//!
//! All access goes through one SQLite connection behind a mutex. Each
//! call holds the lock for a single statement, so workers queue behind
//! each other only for the duration of one row operation.
//!
//! Writes open a transaction lazily; [`Catalog::commit`] ends it. Anything
//! written since the last commit is lost if the process dies, which is
//! exactly the checkpoint window the coordinator controls.

use crate::catalog::models::{CatalogStats, FolderRecord, FolderStatus, Session};
use crate::catalog::schema;
use crate::config::SweepConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::walker::WorkItem;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

/// Durable store of sessions and folders
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

impl Catalog {
    /// Open (or create) a catalog file
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let conn = Connection::open(path).map_err(|e| CatalogError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        schema::create_catalog(&conn)?;
        debug!(path = %path.display(), "Catalog opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory catalog, for tests and throwaway runs
    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::create_catalog(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside the open write transaction, starting one if needed
    fn write<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> CatalogResult<T> {
        let conn = self.conn.lock();
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(f(&conn)?)
    }

    /// Make everything written so far durable. Idempotent.
    pub fn commit(&self) -> CatalogResult<()> {
        let conn = self.conn.lock();
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────

    /// Register a new run and persist its configuration
    pub fn create_session(&self, config: &SweepConfig) -> CatalogResult<Session> {
        let now = chrono::Local::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let session = Session {
            id: format!("session_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8]),
            started_at: now.to_rfc3339(),
            config: config.clone(),
            root_path: config.root_key(),
            completed: false,
        };
        let config_json = serde_json::to_string(config)?;

        self.write(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, started_at, config, root_path, completed) \
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![session.id, session.started_at, config_json, session.root_path],
            )
        })?;
        self.commit()?;

        info!(session = %session.id, root = %session.root_path, "Session created");
        Ok(session)
    }

    /// Flag the scan phase of a session as fully drained
    pub fn mark_session_complete(&self, session_id: &str) -> CatalogResult<()> {
        let updated = self.write(|conn| {
            conn.execute(
                "UPDATE sessions SET completed = 1 WHERE id = ?1",
                params![session_id],
            )
        })?;
        if updated == 0 {
            return Err(CatalogError::SessionNotFound(session_id.to_string()));
        }
        self.commit()
    }

    /// Look up a session by id
    pub fn session(&self, session_id: &str) -> CatalogResult<Option<Session>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, started_at, config, root_path, completed FROM sessions WHERE id = ?1",
                params![session_id],
                session_columns,
            )
            .optional()?;
        row.map(into_session).transpose()
    }

    /// Most recently started session whose scan did not finish
    pub fn last_incomplete_session(&self) -> CatalogResult<Option<Session>> {
        self.latest_session_where("completed = 0")
    }

    /// Most recently started session whose scan finished
    pub fn last_completed_session(&self) -> CatalogResult<Option<Session>> {
        self.latest_session_where("completed = 1")
    }

    fn latest_session_where(&self, predicate: &str) -> CatalogResult<Option<Session>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT id, started_at, config, root_path, completed FROM sessions \
             WHERE {} ORDER BY started_at DESC, rowid DESC LIMIT 1",
            predicate
        );
        let row = conn.query_row(&sql, [], session_columns).optional()?;
        row.map(into_session).transpose()
    }

    /// Sessions newest first, each with its folder statistics
    pub fn list_sessions(&self, limit: usize) -> CatalogResult<Vec<(Session, CatalogStats)>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, started_at, config, root_path, completed FROM sessions \
                 ORDER BY started_at DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], session_columns)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        rows.into_iter()
            .map(|row| {
                let session = into_session(row)?;
                let stats = self.stats(&session.id)?;
                Ok((session, stats))
            })
            .collect()
    }

    // ── Folders ──────────────────────────────────────────────────

    /// Record a newly discovered folder as PENDING. Re-adding is a no-op.
    pub fn add_folder(&self, session_id: &str, path: &str, depth: u32) -> CatalogResult<()> {
        self.write(|conn| {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO folders (path, session_id, depth) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![path, session_id, depth])
        })?;
        Ok(())
    }

    /// Record a completed listing
    pub fn record_scanned(
        &self,
        session_id: &str,
        path: &str,
        entry_count: u64,
    ) -> CatalogResult<()> {
        self.write(|conn| {
            conn.prepare_cached(
                "UPDATE folders SET entry_count = ?1, status = 'SCANNED', error_message = NULL \
                 WHERE path = ?2 AND session_id = ?3",
            )?
            .execute(params![entry_count as i64, path, session_id])
        })?;
        Ok(())
    }

    /// Record a failure against `path`, creating the row if it was never enqueued
    pub fn record_error(
        &self,
        session_id: &str,
        path: &str,
        depth: u32,
        message: &str,
    ) -> CatalogResult<()> {
        self.write(|conn| {
            conn.prepare_cached(
                "INSERT INTO folders (path, session_id, depth, status, error_message) \
                 VALUES (?1, ?2, ?3, 'ERROR', ?4) \
                 ON CONFLICT(path, session_id) DO UPDATE SET \
                 status = 'ERROR', error_message = excluded.error_message",
            )?
            .execute(params![path, session_id, depth, message])
        })?;
        Ok(())
    }

    /// Set the cleanup outcome of a folder
    pub fn set_status(
        &self,
        session_id: &str,
        path: &str,
        status: FolderStatus,
    ) -> CatalogResult<()> {
        self.write(|conn| {
            conn.prepare_cached("UPDATE folders SET status = ?1 WHERE path = ?2 AND session_id = ?3")?
                .execute(params![status.as_str(), path, session_id])
        })?;
        Ok(())
    }

    /// Cleanup removed the folder
    pub fn mark_deleted(&self, session_id: &str, path: &str) -> CatalogResult<()> {
        self.set_status(session_id, path, FolderStatus::Deleted)
    }

    /// Simulation: the folder would have been removed
    pub fn mark_would_delete(&self, session_id: &str, path: &str) -> CatalogResult<()> {
        self.set_status(session_id, path, FolderStatus::WouldDelete)
    }

    /// One folder row
    pub fn folder(&self, session_id: &str, path: &str) -> CatalogResult<Option<FolderRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT path, session_id, depth, entry_count, status, error_message \
                 FROM folders WHERE path = ?1 AND session_id = ?2",
                params![path, session_id],
                folder_columns,
            )
            .optional()?;
        row.map(into_folder).transpose()
    }

    /// All folder rows of a session, shallowest first
    pub fn folders(&self, session_id: &str) -> CatalogResult<Vec<FolderRecord>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT path, session_id, depth, entry_count, status, error_message \
                 FROM folders WHERE session_id = ?1 ORDER BY depth ASC, path ASC",
            )?;
            let rows = stmt
                .query_map(params![session_id], folder_columns)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(into_folder).collect()
    }

    /// Unscanned work, shallowest first
    pub fn pending(&self, session_id: &str) -> CatalogResult<Vec<WorkItem>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path, depth FROM folders WHERE status = 'PENDING' AND session_id = ?1 \
             ORDER BY depth ASC",
        )?;
        let items = stmt
            .query_map(params![session_id], |row| {
                Ok(WorkItem::new(row.get::<_, String>(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Empty, scanned folders at or below `min_depth`, deepest first
    pub fn empty_candidates(&self, session_id: &str, min_depth: usize) -> CatalogResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path FROM folders \
             WHERE session_id = ?1 AND status = 'SCANNED' AND entry_count = 0 AND depth >= ?2 \
             ORDER BY depth DESC",
        )?;
        let paths = stmt
            .query_map(params![session_id, min_depth as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// (path, message) for every ERROR row
    pub fn errors(&self, session_id: &str) -> CatalogResult<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path, COALESCE(error_message, '') FROM folders \
             WHERE status = 'ERROR' AND session_id = ?1 ORDER BY path",
        )?;
        let errors = stmt
            .query_map(params![session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(errors)
    }

    /// Row counts by status for one session
    pub fn stats(&self, session_id: &str) -> CatalogResult<CatalogStats> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*), SUM(CASE WHEN entry_count = 0 THEN 1 ELSE 0 END) \
             FROM folders WHERE session_id = ?1 GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stats = CatalogStats::default();
        for (status, count, zero_entries) in rows {
            let count = count as u64;
            stats.total += count;
            match status.parse::<FolderStatus>()? {
                FolderStatus::Pending => stats.pending = count,
                FolderStatus::Scanned => {
                    stats.scanned = count;
                    stats.empty = zero_entries as u64;
                }
                FolderStatus::Error => stats.errors = count,
                FolderStatus::Deleted => stats.deleted = count,
                FolderStatus::WouldDelete => stats.would_delete = count,
            }
        }
        Ok(stats)
    }

    /// Drop PENDING rows whose path no longer exists on disk.
    ///
    /// Runs once before a resumed scan. Returns how many rows were removed.
    pub fn invalidate_missing(&self, session_id: &str) -> CatalogResult<usize> {
        let stale: Vec<String> = self
            .pending(session_id)?
            .into_iter()
            .map(|item| item.path)
            .filter(|path| !Path::new(path).exists())
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let removed = self.write(|conn| {
            let mut stmt = conn.prepare_cached(
                "DELETE FROM folders WHERE path = ?1 AND session_id = ?2 AND status = 'PENDING'",
            )?;
            let mut removed = 0;
            for path in &stale {
                removed += stmt.execute(params![path, session_id])?;
            }
            Ok(removed)
        })?;
        self.commit()?;

        info!(session = %session_id, removed, "Invalidated stale pending folders");
        Ok(removed)
    }
}

type SessionColumns = (String, String, String, String, bool);

fn session_columns(row: &Row<'_>) -> rusqlite::Result<SessionColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_session(
    (id, started_at, config, root_path, completed): SessionColumns,
) -> CatalogResult<Session> {
    Ok(Session {
        id,
        started_at,
        config: serde_json::from_str(&config)?,
        root_path,
        completed,
    })
}

type FolderColumns = (String, String, u32, i64, String, Option<String>);

fn folder_columns(row: &Row<'_>) -> rusqlite::Result<FolderColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_folder(
    (path, session_id, depth, entry_count, status, error_message): FolderColumns,
) -> CatalogResult<FolderRecord> {
    Ok(FolderRecord {
        path,
        session_id,
        depth,
        entry_count,
        status: status.parse()?,
        error_message,
    })
}
