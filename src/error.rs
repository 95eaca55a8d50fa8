//! HTTP error type. Every body has the shape `{"errors": <detail>}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected input (400), keyed by field. Non-field problems use `"non_field_errors"`.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Request body that is not the JSON we expect (400).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    #[error("Requested profile does not exist")]
    ProfileNotFound,

    /// Logged, never shown to the client (500).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(e) => Self::Internal(e),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, errors) = match &self {
            Self::Validation { field, message } => {
                (StatusCode::BAD_REQUEST, json!({ *field: [message] }))
            }
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, json!({ "detail": detail })),
            Self::Unauthorized(detail) => (StatusCode::UNAUTHORIZED, json!({ "detail": detail })),
            Self::ProfileNotFound => (
                StatusCode::BAD_REQUEST,
                json!({ "detail": self.to_string() }),
            ),
            Self::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal server error" }),
                )
            }
        };
        (status, Json(json!({ "errors": errors }))).into_response()
    }
}
