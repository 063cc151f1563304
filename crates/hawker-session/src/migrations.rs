//! Schema for the session database.
//!
//! An append-only migration list applied in order at open. Each entry
//! records itself in `schema_migrations`, so reopening an existing file
//! runs only what is missing.

use rusqlite::Connection;
use tracing::info;

use crate::error::SessionError;

/// New schema changes go at the end with the next version number.
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "sessions_schema",
    "-- One row per conversation. History and order state are JSON
    -- documents owned by the application; SQLite only stores them.
    CREATE TABLE IF NOT EXISTS sessions (
        conversation_id TEXT PRIMARY KEY NOT NULL,
        history         TEXT NOT NULL,
        order_state     TEXT,
        version         INTEGER NOT NULL,
        updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_updated_at
        ON sessions (updated_at DESC);",
)];

/// Bring the connected database up to the latest schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), SessionError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SessionError::Storage(format!("create migrations table: {}", e)))?;

    let applied: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SessionError::Storage(format!("read schema version: {}", e)))?;

    for (version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > applied) {
        conn.execute_batch(sql)
            .map_err(|e| SessionError::Storage(format!("apply migration v{}: {}", version, e)))?;
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![version, name],
        )
        .map_err(|e| SessionError::Storage(format!("record migration v{}: {}", version, e)))?;
        info!("Applied migration v{}: {}", version, name);
    }

    Ok(())
}
