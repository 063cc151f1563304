//! Application state shared across all route handlers.
//!
//! AppState holds the dialogue engine and shared resources. It is passed
//! to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use hawker_chat::DialogueOrchestrator;
use hawker_core::config::HawkerConfig;
use hawker_search::ProductIndex;

/// Shared application state. Cheap to clone across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// The dialogue engine handling every conversation turn.
    pub orchestrator: Arc<DialogueOrchestrator>,
    /// Product catalog index, shared with the engine.
    pub index: ProductIndex,
    /// Application configuration.
    pub config: Arc<HawkerConfig>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<DialogueOrchestrator>,
        index: ProductIndex,
        config: HawkerConfig,
    ) -> Self {
        Self {
            orchestrator,
            index,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
