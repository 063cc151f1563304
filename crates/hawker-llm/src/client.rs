//! The client trait, its error type, and the scripted mock.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio_stream::Stream;

/// Failure modes of a completion call.
///
/// The classifier retries only when [`LlmError::is_transient`] holds, so the
/// distinction between variants matters more than their messages.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed completion: {0}")]
    Malformed(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl LlmError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Client-side HTTP errors (bad request, auth) are permanent; everything
    /// else, including malformed completions, may clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            LlmError::Timeout => true,
            LlmError::Malformed(_) => true,
            LlmError::Unavailable(_) => true,
        }
    }
}

/// Incremental completion output. Each item is a text fragment in order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// A single completion call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    /// Sampling temperature. Range: 0.0 to 2.0.
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature: temperature.clamp(0.0, 2.0),
        }
    }
}

/// Backend-agnostic completion interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the full text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Run one completion, yielding text fragments as they arrive.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError>;
}

/// Scripted in-process client for tests.
///
/// Outcomes are consumed front-to-back, one per `complete` call. Every call
/// records its prompt, so tests can assert both call counts and prompt
/// contents. An exhausted script yields `Unavailable`.
#[derive(Default)]
pub struct MockLlm {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn push_ok(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_err(&self, err: LlmError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of `complete` calls made, including failed ones.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("mock script exhausted".to_string())))
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        let text = self.complete(request).await?;
        // Split on whitespace to exercise multi-fragment consumers
        let fragments: Vec<Result<String, LlmError>> = text
            .split_inclusive(' ')
            .map(|part| Ok(part.to_string()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(fragments)))
    }
}
