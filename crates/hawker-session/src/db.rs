//! SQLite connection handling for the session store.
//!
//! One connection per [`Database`], serialized behind a mutex. Session
//! reads and writes are single-row and microsecond-scale, so contention on
//! the lock is not a concern at chat traffic rates.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use crate::error::SessionError;
use crate::migrations;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;
     PRAGMA cache_size = -65536;";

/// Owned SQLite handle with WAL mode and migrations applied.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    ///
    /// Any failure here means sessions cannot be persisted at all, which is
    /// why everything maps to [`SessionError::Unavailable`].
    pub fn new(path: &Path) -> Result<Self, SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Unavailable(format!("create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| SessionError::Unavailable(format!("open database: {}", e)))?;
        let db = Self::prepare(conn)?;

        info!("Session database opened at {}", path.display());
        Ok(db)
    }

    /// Volatile database for tests. Same pragmas and schema, no file.
    pub fn in_memory() -> Result<Self, SessionError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SessionError::Unavailable(format!("open in-memory db: {}", e)))?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(PRAGMAS)
            .map_err(|e| SessionError::Unavailable(format!("set pragmas: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` against the connection, holding the lock for its duration.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Connection) -> Result<T, SessionError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SessionError::Unavailable(format!("database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
