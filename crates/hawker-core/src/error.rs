use thiserror::Error;

/// Top-level error for the Hawker workspace.
///
/// Subsystem crates keep their own error enums and convert at crate
/// boundaries via `From`, so `?` flows across the workspace without
/// manual mapping.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HawkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Intent classification error: {0}")]
    Intent(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Order flow error: {0}")]
    Order(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Session store unavailable: {0}")]
    SessionUnavailable(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Message too long: {size} characters exceeds {limit}")]
    MessageTooLong { size: usize, limit: usize },
}

impl From<toml::de::Error> for HawkerError {
    fn from(err: toml::de::Error) -> Self {
        HawkerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HawkerError {
    fn from(err: toml::ser::Error) -> Self {
        HawkerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HawkerError {
    fn from(err: serde_json::Error) -> Self {
        HawkerError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Hawker operations.
pub type Result<T> = std::result::Result<T, HawkerError>;
