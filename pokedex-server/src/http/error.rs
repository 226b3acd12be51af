//! API error type with IntoResponse
//!
//! Errors become JSON bodies `{"error": <kind>, "message": <text>}`.
//! Internal failures are logged and answered with a generic message plus
//! the request id, so the log line can be found again.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pokedex_core::{LoadError, PaginationError, RequestScope};
use serde_json::json;

use crate::resolvers::ResolveError;
use crate::store::StoreError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Bad arguments (400)
    Validation { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Store failure (500, logged)
    Store(StoreError),

    /// Field resolution failure (500, logged)
    Load(LoadError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn internal_error_body() -> serde_json::Value {
    let request_id = RequestScope::try_current().map(|scope| scope.request_id().to_owned());
    json!({
        "error": "internal_error",
        "message": "an internal error occurred",
        "requestId": request_id,
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": message
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Store(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, internal_error_body())
            }
            Self::Load(e) => {
                tracing::error!("Resolution error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, internal_error_body())
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, internal_error_body())
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<PaginationError> for ApiError {
    fn from(e: PaginationError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { resource, id } => Self::NotFound { resource, id },
            _ => Self::Store(e),
        }
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Pagination(e) => e.into(),
            ResolveError::Store(e) => e.into(),
            ResolveError::Load(e) => e.into(),
            e @ ResolveError::InvalidId { .. } => Self::validation(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
