//! Crate-wide error type.
//!
//! The pipeline itself never raises across its own boundary — every
//! internal failure is mapped to a [`crate::models::Nl2SqlResponse`]
//! before it reaches the streaming layer. `AppError` exists for the
//! boundaries that still need a `Result`: configuration at startup,
//! and the HTTP handlers that sit in front of the SSE generator.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("llm collaborator error: {0}")]
    Llm(String),

    #[error("search collaborator error: {0}")]
    Search(String),

    #[error("sql execution error: {0}")]
    SqlExecution(String),

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Configuration(msg) => {
                error!(error = %msg, "configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured".to_string())
            }
            AppError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred".to_string())
            }
            AppError::Llm(msg) => {
                error!(error = %msg, "llm collaborator error");
                (StatusCode::BAD_GATEWAY, "Upstream model error".to_string())
            }
            AppError::Search(msg) => {
                error!(error = %msg, "search collaborator error");
                (StatusCode::BAD_GATEWAY, "Search service error".to_string())
            }
            AppError::SqlExecution(msg) => {
                error!(error = %msg, "sql execution error");
                (StatusCode::BAD_GATEWAY, "Query execution failed".to_string())
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
        };

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
