//! HTTP error mapping.
//!
//! Every handler failure renders as the same `{ error, message }` JSON
//! body, with the status code carried by the [`ApiError`] variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use hawker_chat::ChatError;

/// Wire shape of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code ("bad_request", "service_unavailable", ...).
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400: the request itself is wrong (empty or oversized message).
    BadRequest(String),
    /// 500: unexpected failure inside the engine.
    Internal(String),
    /// 503: the session store cannot be reached, retry later.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::SessionUnavailable(_) => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::SessionStore(_) => ApiError::Internal(err.to_string()),
        }
    }
}
