//! Error types for the dialogue engine.

use hawker_core::error::HawkerError;
use hawker_session::SessionError;

/// Errors from the dialogue engine.
///
/// Backend failures inside a turn (model, index, web) degrade to fallback
/// replies instead of surfacing here. Only input validation and session
/// store trouble reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session store unavailable: {0}")]
    SessionUnavailable(String),
    #[error("session store error: {0}")]
    SessionStore(String),
}

impl From<SessionError> for ChatError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unavailable(msg) => ChatError::SessionUnavailable(msg),
            other => ChatError::SessionStore(other.to_string()),
        }
    }
}

impl From<ChatError> for HawkerError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::SessionUnavailable(msg) => HawkerError::SessionUnavailable(msg),
            ChatError::SessionStore(msg) => HawkerError::Session(msg),
            other => HawkerError::Api(other.to_string()),
        }
    }
}
