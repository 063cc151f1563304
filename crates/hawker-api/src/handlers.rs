//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters via axum extractors, drives the
//! dialogue engine through AppState, and returns JSON responses. The
//! streaming chat endpoint speaks SSE.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use uuid::Uuid;

use hawker_chat::{EngineResponse, EngineStats, OrderSnapshot, SourceAttribution, StreamEvent};
use hawker_core::types::{IntentLabel, Message};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omitted on the first message; the server assigns one.
    pub conversation_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub reply: String,
    pub intent: IntentLabel,
    pub confidence: f64,
    pub sources: Vec<SourceAttribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSnapshot>,
    pub degraded: bool,
}

impl ChatResponse {
    fn from_engine(conversation_id: String, engine: EngineResponse) -> Self {
        Self {
            conversation_id,
            reply: engine.text,
            intent: engine.intent,
            confidence: engine.confidence,
            sources: engine.sources,
            order: engine.order,
            degraded: engine.degraded,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub indexed_products: u64,
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - handle one message and return the full reply envelope.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let conversation_id = body
        .conversation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let response = state
        .orchestrator
        .handle(&conversation_id, &body.message)
        .await?;

    Ok(Json(ChatResponse::from_engine(conversation_id, response)))
}

/// POST /chat/stream - handle one message, streaming the reply over SSE.
///
/// Emits `chunk` events with raw reply text, then a single `done` event
/// carrying the same JSON envelope POST /chat returns.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let conversation_id = body
        .conversation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let events = state
        .orchestrator
        .clone()
        .handle_stream(&conversation_id, &body.message)
        .await?;

    let stream = events.map(move |event| {
        Ok(match event {
            StreamEvent::Chunk(text) => Event::default().event("chunk").data(text),
            StreamEvent::Done(response) => {
                let envelope = ChatResponse::from_engine(conversation_id.clone(), response);
                let data = serde_json::to_string(&envelope).unwrap_or_default();
                Event::default().event("done").data(data)
            }
        })
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

// =============================================================================
// Conversations
// =============================================================================

/// GET /conversations/{id}/history - stored messages, oldest first.
///
/// Unknown conversations yield an empty list rather than 404; the client
/// cannot tell a never-seen id from an expired one.
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state.orchestrator.history(&id)?;
    Ok(Json(HistoryResponse {
        conversation_id: id,
        messages,
    }))
}

/// DELETE /conversations/{id} - drop a conversation and its order.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.orchestrator.forget(&id)?;
    Ok(Json(DeleteResponse { deleted: true }))
}

// =============================================================================
// Introspection
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        indexed_products: state.index.len() as u64,
    })
}

/// GET /stats - engine counters since startup.
pub async fn stats(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.orchestrator.stats())
}

// =============================================================================
// Tests
// =============================================================================
