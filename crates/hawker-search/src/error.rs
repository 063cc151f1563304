//! Error types for the search layer.

/// Errors from the search subsystem.
///
/// The aggregator treats all of these as degradation signals rather than
/// request failures: an index error falls back to web-only search, a web
/// error to internal-only.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("index error: {0}")]
    Index(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("web search error: {0}")]
    Web(String),
    #[error("web search is disabled")]
    WebDisabled,
}
