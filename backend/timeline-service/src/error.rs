//! Error types for the timeline service
//!
//! Durable-store failures surface to callers. Cache failures never reach
//! this type: the cache layer degrades them to misses or no-ops.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for timeline-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        // Do not leak driver messages to clients
        let message = match self {
            AppError::Database(_) => "Database error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        }))
    }
}
