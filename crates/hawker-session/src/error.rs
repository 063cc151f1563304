use thiserror::Error;

use hawker_core::error::HawkerError;

/// Failure modes of the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A save raced another writer: the caller's base version no longer
    /// matches the stored one. Reload, reapply, retry.
    #[error("version conflict: saved from version {0}, store is at {1}")]
    VersionConflict(u64, u64),

    /// The store cannot be reached at all. The only session failure the
    /// orchestrator surfaces instead of degrading around.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session store error: {0}")]
    Storage(String),
}

impl From<SessionError> for HawkerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unavailable(msg) => HawkerError::SessionUnavailable(msg),
            other => HawkerError::Session(other.to_string()),
        }
    }
}
