//! Error taxonomy for the API surface.
//!
//! Every handler failure is converted into the uniform response envelope
//! `{success, message}`. Owner-only operations deliberately collapse
//! "missing" and "not yours" into the same 404 so callers cannot probe for
//! resources that belong to someone else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (HTTP 400).
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credentials (HTTP 401).
    #[error("{0}")]
    Auth(String),

    /// Duplicate registration, duplicate friendship edge (HTTP 400).
    #[error("{0}")]
    Conflict(String),

    /// Resource missing, or present but owned by someone else (HTTP 404).
    #[error("{0}")]
    NotFound(String),

    /// Caller is known but not allowed (HTTP 403). Only used where the API
    /// contract exposes the distinction, e.g. story viewer lists.
    #[error("{0}")]
    Forbidden(String),

    /// Anything unexpected (HTTP 500).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(err) => {
                error!("internal error: {err:#}");
                if cfg!(debug_assertions) {
                    format!("Internal server error: {err}")
                } else {
                    "Internal server error".to_string()
                }
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "success": false, "message": message }));
        (status, body).into_response()
    }
}
