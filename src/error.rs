// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
///
/// Nothing here is fatal to the process: every variant is local to the
/// request or quiz session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found (quiz missing, inactive, or without questions)
    NotFound(String),

    // 409 Conflict (e.g., duplicate order_index)
    Conflict(String),

    // 409 Conflict, operation not allowed in the current session state
    InvalidState(String),

    // 409 Conflict, policy refusal; the learner is sent to the results view
    AttemptLimitExceeded {
        quiz_id: i64,
        attempts: usize,
        max_attempts: i32,
    },

    // 503 Service Unavailable, retryable store failure
    Persistence(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AttemptLimitExceeded {
                quiz_id,
                attempts,
                max_attempts,
            } => write!(
                f,
                "attempt limit reached for quiz {} ({}/{})",
                quiz_id, attempts, max_attempts
            ),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) | AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, json!({ "error": msg }))
            }
            AppError::AttemptLimitExceeded {
                quiz_id,
                attempts,
                max_attempts,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Attempt limit reached",
                    "attempts": attempts,
                    "max_attempts": max_attempts,
                    "results_url": format!("/api/quizzes/{}/attempts", quiz_id),
                }),
            ),
            AppError::Persistence(msg) => {
                tracing::error!("Persistence failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Storage unavailable, please retry", "retryable": true }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_check_violation() => {
                AppError::BadRequest(db.message().to_string())
            }
            _ => AppError::Persistence(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
