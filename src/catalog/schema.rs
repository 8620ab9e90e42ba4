//! Catalog schema definitions and creation
//!
//! Two tables: one row per run in `sessions`, one row per discovered
//! folder per session in `folders`.

use crate::error::CatalogResult;
use rusqlite::Connection;

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    config TEXT NOT NULL,
    root_path TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0   -- 1 once the scan phase drained
)
"#;

const CREATE_FOLDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS folders (
    path TEXT NOT NULL,
    session_id TEXT NOT NULL,
    depth INTEGER NOT NULL,
    entry_count INTEGER NOT NULL DEFAULT -1,   -- -1 = unknown
    status TEXT NOT NULL DEFAULT 'PENDING',
    error_message TEXT,
    PRIMARY KEY (path, session_id)
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_folders_status ON folders(session_id, status, depth)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at)",
];

/// Pragmas for a catalog shared by many writers through one connection
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;      -- 64MB cache
PRAGMA temp_store = MEMORY;
PRAGMA busy_timeout = 5000;
"#;

/// Configure the connection and create tables and indexes if missing
pub fn create_catalog(conn: &Connection) -> CatalogResult<()> {
    conn.execute_batch(PRAGMAS)?;

    conn.execute(CREATE_SESSIONS_TABLE, [])?;
    conn.execute(CREATE_FOLDERS_TABLE, [])?;
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_catalog() {
        let conn = Connection::open_in_memory().unwrap();
        create_catalog(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(tables, vec!["folders".to_string(), "sessions".to_string()]);

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_create_catalog_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_catalog(&conn).unwrap();
        create_catalog(&conn).unwrap();
    }
}
