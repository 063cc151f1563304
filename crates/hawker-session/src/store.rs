//! The store abstraction and the in-memory backend.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use hawker_core::types::{ConversationHistory, OrderState};

use crate::error::SessionError;

/// Everything persisted for one conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub conversation_id: String,
    pub history: ConversationHistory,
    /// Present only while an order is in flight or finished.
    pub order: Option<OrderState>,
    /// Optimistic-concurrency token. 0 means never saved; each successful
    /// save bumps it by one.
    pub version: u64,
}

impl SessionRecord {
    pub fn new(conversation_id: impl Into<String>, history_cap: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            history: ConversationHistory::new(history_cap),
            order: None,
            version: 0,
        }
    }
}

/// Session persistence backend.
///
/// `save` is compare-and-swap on `record.version`: it succeeds only when the
/// stored version still equals the one the record was loaded at, and returns
/// the new version. A concurrent writer surfaces as
/// [`SessionError::VersionConflict`]; the caller reloads and reapplies.
pub trait SessionStore: Send + Sync {
    fn load(&self, conversation_id: &str) -> Result<Option<SessionRecord>, SessionError>;

    fn save(&self, record: &SessionRecord) -> Result<u64, SessionError>;

    fn delete(&self, conversation_id: &str) -> Result<(), SessionError>;
}

/// In-memory backend. The test backbone, and good enough for single-process
/// deployments that can afford to lose sessions on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, conversation_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| SessionError::Unavailable(format!("lock poisoned: {}", e)))?;
        Ok(sessions.get(conversation_id).cloned())
    }

    fn save(&self, record: &SessionRecord) -> Result<u64, SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| SessionError::Unavailable(format!("lock poisoned: {}", e)))?;

        let current = sessions
            .get(&record.conversation_id)
            .map(|stored| stored.version)
            .unwrap_or(0);
        if current != record.version {
            return Err(SessionError::VersionConflict(record.version, current));
        }

        let next = record.version + 1;
        let mut stored = record.clone();
        stored.version = next;
        sessions.insert(record.conversation_id.clone(), stored);
        Ok(next)
    }

    fn delete(&self, conversation_id: &str) -> Result<(), SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| SessionError::Unavailable(format!("lock poisoned: {}", e)))?;
        sessions.remove(conversation_id);
        Ok(())
    }
}
