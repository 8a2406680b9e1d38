//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use minicron_scheduler::SchedulerError;
use minicron_store::StoreError;

/// API-level errors, each mapping to one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input or expression. 400.
    #[error("{0}")]
    Validation(String),

    /// Missing resource. 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate id or run-while-running. 409.
    #[error("{0}")]
    Conflict(String),

    /// Persistence failure. 500.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Storage(_) => "storage_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error_kind": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(id),
            StoreError::Conflict(id) => ApiError::Conflict(format!("Job id already exists: {}", id)),
            StoreError::Validation(e) => ApiError::Validation(e.to_string()),
            StoreError::InvalidJob(msg) => ApiError::Validation(msg),
            StoreError::Io(msg) | StoreError::Serialize(msg) => ApiError::Storage(msg),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning(id) => {
                ApiError::Conflict(format!("Job is already running: {}", id))
            }
            SchedulerError::Saturated(limit) => ApiError::Conflict(format!(
                "Too many concurrent executions (limit {})",
                limit
            )),
            SchedulerError::Store(e) => e.into(),
        }
    }
}
