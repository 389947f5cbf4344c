//! Database schema and initialization

use crate::error::{Result, TransferError};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Main database handle.
///
/// The connection sits behind a mutex so the handle can be shared across
/// tasks; callers never hold the guard across an `.await`.
pub struct Database {
    conn: Mutex<Connection>,
}

const SCHEMA_VERSION: i32 = 2;

const CREATE_TABLES: &str = r#"
-- Authoritative transfer metadata, one row per (content, locator, scope partition)
CREATE TABLE IF NOT EXISTS transfer_metadata (
    id TEXT PRIMARY KEY,
    content_id TEXT NOT NULL,
    locator TEXT NOT NULL,
    locator_disc TEXT NOT NULL,
    scope_kind TEXT NOT NULL,
    scope_partition TEXT NOT NULL,
    family_id TEXT,
    institution_id TEXT,
    result TEXT NOT NULL,
    version TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    created_by TEXT,
    UNIQUE(content_id, locator, scope_partition)
);

-- Advisory key-value cache with expiry (unix millis)
CREATE TABLE IF NOT EXISTS fast_cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

-- Content items
CREATE TABLE IF NOT EXISTS contents (
    id TEXT PRIMARY KEY,
    title TEXT,
    content_type TEXT,
    subject TEXT,
    topic TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    imported_at TEXT NOT NULL
);

-- Text chunks of a content item
CREATE TABLE IF NOT EXISTS content_chunks (
    content_id TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    chunk_id TEXT,
    page INTEGER,
    text TEXT,
    PRIMARY KEY (content_id, seq)
);

-- Glossary terms ('primary' or 'secondary' source)
CREATE TABLE IF NOT EXISTS glossary_terms (
    content_id TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
    source TEXT NOT NULL,
    position INTEGER NOT NULL,
    term TEXT NOT NULL,
    definition TEXT,
    PRIMARY KEY (content_id, source, position)
);

-- Reader annotations
CREATE TABLE IF NOT EXISTS annotations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    tag TEXT,
    text TEXT NOT NULL,
    page INTEGER,
    cue_terms TEXT NOT NULL DEFAULT '[]'
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_transfer_metadata_content ON transfer_metadata(content_id, scope_partition);
CREATE INDEX IF NOT EXISTS idx_fast_cache_expires ON fast_cache(expires_at);
CREATE INDEX IF NOT EXISTS idx_content_chunks_chunk_id ON content_chunks(content_id, chunk_id);
CREATE INDEX IF NOT EXISTS idx_annotations_content ON annotations(content_id);
"#;

impl Database {
    /// Open database at path, creating if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection. A poisoned lock means a panic mid-statement, so
    /// the store is reported unavailable rather than reused.
    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TransferError::StoreUnavailable("database lock poisoned".to_string()))
    }

    /// Initialize database schema
    pub fn initialize(&self) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;

            conn.execute_batch(CREATE_TABLES)?;
        }

        // Upgrade older databases before recording the version
        self.migrate()?;

        self.conn()?.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        let purged = self.purge_expired_cache()?;
        if purged > 0 {
            tracing::debug!(purged, "Removed expired fast-cache rows");
        }

        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let version = self
            .conn()?
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();
        Ok(version)
    }

    /// Run migrations to upgrade schema to current version
    pub fn migrate(&self) -> Result<()> {
        let current = self.schema_version()?.unwrap_or(0);

        if current < 2 {
            self.migrate_to_v2()?;
        }

        Ok(())
    }

    fn migrate_to_v2(&self) -> Result<()> {
        let conn = self.conn()?;

        // v1 databases predate the audit column
        let has_created_by: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('transfer_metadata') WHERE name = 'created_by'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_created_by {
            conn.execute("ALTER TABLE transfer_metadata ADD COLUMN created_by TEXT", [])?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![2],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata.sqlite");
        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_migrates_v1_table_without_audit_column() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TABLE transfer_metadata (
                    id TEXT PRIMARY KEY,
                    content_id TEXT NOT NULL,
                    locator TEXT NOT NULL,
                    locator_disc TEXT NOT NULL,
                    scope_kind TEXT NOT NULL,
                    scope_partition TEXT NOT NULL,
                    family_id TEXT,
                    institution_id TEXT,
                    result TEXT NOT NULL,
                    version TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(content_id, locator, scope_partition)
                );
                CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
                INSERT INTO schema_version (version) VALUES (1);",
            )
            .unwrap();

        db.initialize().unwrap();

        let has_column: bool = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('transfer_metadata') WHERE name = 'created_by'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_column);
        assert_eq!(db.schema_version().unwrap(), Some(2));
    }
}
