//! Dialogue engine for Hawker.
//!
//! Ties the subsystems into one conversational loop: resolve references
//! against history, classify intent, then either answer from retrieved
//! evidence or advance the order flow. Every turn is persisted through the
//! session store with optimistic versioning.

pub mod consultation;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod types;
pub mod validator;

pub use consultation::{ConsultationHandler, ConsultationOutcome};
pub use context::{ContextResolver, ResolvedMessage};
pub use error::ChatError;
pub use orchestrator::{DialogueOrchestrator, StreamEvent, MAX_MESSAGE_LENGTH};
pub use types::{EngineResponse, EngineStats, OrderSnapshot, SourceAttribution};
pub use validator::{ResponseValidator, Verdict};
