//! HTTP Error Types
//!
//! Maps application errors to JSON error responses of the form
//! `{"error": "...", "code": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bgsync_core::error::AppError;
use serde_json::json;

/// Error codes carried in the `code` field
pub mod code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const QUEUE_UNAVAILABLE: &str = "QUEUE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Error returned by HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        let ApiError::App(err) = self;
        match err {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, code::NOT_FOUND, msg.clone()),
            AppError::Queue(msg) => {
                tracing::error!(error = %msg, "Queue transport error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code::QUEUE_UNAVAILABLE,
                    "Job queue is unavailable".to_string(),
                )
            }
            other => {
                tracing::error!(error = %other, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code::INTERNAL_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();
        let body = json!({
            "error": message,
            "code": code,
        });
        (status, Json(body)).into_response()
    }
}
