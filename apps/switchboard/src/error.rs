use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use switchboard_common::SessionId;

// ---------------------------------------------------------------------------
// Core errors
// ---------------------------------------------------------------------------

/// Misuse of a session's lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The disconnect sweep already ran for this session.
    #[error("session {0} is disconnected")]
    Disconnected(SessionId),
    /// No transport was ever bound; only happens before the handshake completes.
    #[error("session {0} has no transport bound")]
    NoTransport(SessionId),
}

/// Failure of an outbound write, reported through a `SendHandle`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("session is disconnected")]
    Disconnected,
    #[error("no transport bound")]
    NotBound,
    #[error("transport closed")]
    Closed,
    #[error("outbound queue is full")]
    Backpressure,
    #[error("failed to encode packet: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a session store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("stored value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// HTTP errors
// ---------------------------------------------------------------------------

/// Structured API error returned to clients.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
