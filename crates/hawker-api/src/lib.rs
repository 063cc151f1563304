//! Hawker API crate - axum HTTP server for the dialogue engine.
//!
//! Exposes the conversational loop over REST: chat (plain and SSE
//! streaming), conversation history management, engine statistics, and
//! health checks.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
