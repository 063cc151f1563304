//! SQLite-backed session store.
//!
//! One row per conversation. History and order state travel as JSON text
//! columns; the version column carries the optimistic-concurrency token,
//! and saves are compare-and-swap on it.

use std::sync::Arc;

use hawker_core::types::{ConversationHistory, OrderState};

use crate::db::Database;
use crate::error::SessionError;
use crate::store::{SessionRecord, SessionStore};

pub struct SqliteSessionStore {
    db: Arc<Database>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, conversation_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT history, order_state, version FROM sessions
                     WHERE conversation_id = ?1",
                )
                .map_err(|e| SessionError::Storage(e.to_string()))?;

            let row = stmt
                .query_row(rusqlite::params![conversation_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .optional()
                .map_err(|e| SessionError::Storage(e.to_string()))?;

            let Some((history_json, order_json, version)) = row else {
                return Ok(None);
            };

            let history: ConversationHistory = serde_json::from_str(&history_json)?;
            let order: Option<OrderState> = match order_json {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };

            Ok(Some(SessionRecord {
                conversation_id: conversation_id.to_string(),
                history,
                order,
                version: version as u64,
            }))
        })
    }

    fn save(&self, record: &SessionRecord) -> Result<u64, SessionError> {
        let history_json = serde_json::to_string(&record.history)?;
        let order_json = match &record.order {
            Some(order) => Some(serde_json::to_string(order)?),
            None => None,
        };
        let next = record.version + 1;

        self.db.with_conn(|conn| {
            // version 0 means the record was never saved: insert, and let the
            // primary key catch a racing creator. Otherwise CAS on version.
            let changed = if record.version == 0 {
                conn.execute(
                    "INSERT OR IGNORE INTO sessions
                         (conversation_id, history, order_state, version, updated_at)
                     VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now'))",
                    rusqlite::params![
                        record.conversation_id,
                        history_json,
                        order_json,
                        next as i64,
                    ],
                )
                .map_err(|e| SessionError::Storage(e.to_string()))?
            } else {
                conn.execute(
                    "UPDATE sessions
                     SET history = ?1, order_state = ?2, version = ?3,
                         updated_at = strftime('%s', 'now')
                     WHERE conversation_id = ?4 AND version = ?5",
                    rusqlite::params![
                        history_json,
                        order_json,
                        next as i64,
                        record.conversation_id,
                        record.version as i64,
                    ],
                )
                .map_err(|e| SessionError::Storage(e.to_string()))?
            };

            if changed == 0 {
                let stored: i64 = conn
                    .query_row(
                        "SELECT version FROM sessions WHERE conversation_id = ?1",
                        rusqlite::params![record.conversation_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| SessionError::Storage(e.to_string()))?
                    .unwrap_or(0);
                return Err(SessionError::VersionConflict(record.version, stored as u64));
            }

            Ok(next)
        })
    }

    fn delete(&self, conversation_id: &str) -> Result<(), SessionError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE conversation_id = ?1",
                rusqlite::params![conversation_id],
            )
            .map_err(|e| SessionError::Storage(e.to_string()))?;
            Ok(())
        })
    }
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
