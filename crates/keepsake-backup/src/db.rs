//! Shared handle to the application's SQLite store.

use camino::Utf8Path;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::error::{BackupError, Result};
use crate::schema;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection guarded by a mutex so one collect or restore holds it
/// exclusively for its whole duration.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and ensure the catalog tables exist.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        keepsake_core::utils::ensure_parent_dir(path)
            .map_err(|e| BackupError::Database(e.to_string()))?;

        let conn = Connection::open(path.as_std_path())
            .map_err(|e| BackupError::Database(format!("failed to open {}: {}", path, e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened {} (journal_mode={})", path, mode);

        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BackupError::Database(format!("failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::ensure_catalog(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| BackupError::Database("connection mutex poisoned".to_string()))?;
        f(&mut guard)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_open_in_memory_has_catalog() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('backups', 'backup_settings')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_open_file_creates_parent_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        let path = root.join("data/app.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let fk: i64 = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
