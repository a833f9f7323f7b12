//! Store error types with Axum response mapping.
//!
//! Only construction and the save path surface these to callers; read-path
//! failures are absorbed into a fresh session by the store.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::ConfigError;
use crate::session::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Table provisioning failed: {0}")]
    Provision(String),

    #[error("Session not found")]
    NotFound,

    #[error("Failed to serialize session values: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid Set-Cookie header value")]
    InvalidHeader,
}

impl StoreError {
    /// Wrap an SDK error, keeping its full source chain in the message.
    pub(crate) fn backend<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        StoreError::Backend(aws_sdk_dynamodb::error::DisplayErrorContext(err).to_string())
    }

    pub(crate) fn provision<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        StoreError::Provision(aws_sdk_dynamodb::error::DisplayErrorContext(err).to_string())
    }
}

/// Errors returned by the demo route handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, axum::Json(json!({"error": msg}))).into_response()
            }
            AppError::Store(e) => e.into_response(),
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            StoreError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({"error": "Session not found"}),
            ),
            StoreError::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Session store misconfigured", "message": e.to_string()}),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Failed to persist session"}),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
