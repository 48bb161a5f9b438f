//! Application Error Types
//!
//! Centralized error handling with Axum integration. The same taxonomy is
//! reused by the gateway, which maps errors onto `error` events instead of
//! HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad, missing or expired token. Closes the connection on the gateway.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not a room participant or not the message sender.
    /// Also returned for unknown room ids so that room existence is not
    /// observable to non-members.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The room is archived and rejects new sends.
    #[error("Room is archived")]
    RoomArchived,

    /// The target message is a tombstone and cannot be edited.
    #[error("Message already deleted")]
    AlreadyDeleted,

    /// The session's outbound queue overflowed; the connection is closed.
    #[error("Slow consumer")]
    SlowConsumer,

    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient storage failure after bounded retries. Callers resend with
    /// the same client message id and are answered by the dedup path.
    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Stable numeric code, shared between HTTP error bodies and gateway
    /// `error` events.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Database(_) => 20000,
            AppError::Unauthenticated(_) => 20001,
            AppError::Forbidden(_) => 20002,
            AppError::NotFound(_) => 20003,
            AppError::RoomArchived => 20004,
            AppError::AlreadyDeleted => 20005,
            AppError::SlowConsumer => 20006,
            AppError::Validation(_) => 20007,
            AppError::Unavailable(_) => 20008,
        }
    }

    /// Whether this error terminates the session on the gateway. Everything
    /// else is a structured rejection of a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Unauthenticated(_) | AppError::SlowConsumer)
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::RoomArchived => (StatusCode::CONFLICT, self.to_string()),
            AppError::AlreadyDeleted => (StatusCode::CONFLICT, self.to_string()),
            AppError::SlowConsumer => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Storage unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Temporarily unavailable".into())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        let body = ErrorResponse { code, message };

        (status, Json(body)).into_response()
    }
}
