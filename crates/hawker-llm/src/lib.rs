//! Language model client for Hawker.
//!
//! Defines the [`LlmClient`] seam the rest of the engine programs against,
//! an OpenAI-compatible HTTP implementation, and a scripted mock for tests.

pub mod client;
pub mod http;

pub use client::{CompletionRequest, LlmClient, LlmError, MockLlm, TokenStream};
pub use http::HttpLlmClient;
