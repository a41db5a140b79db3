//! Error type shared by every HTTP handler
//!
//! `AppError` is what handlers return. It knows how to render itself as the
//! JSON error body used across the API:
//!
//! ```json
//! { "error": "Car not found.", "code": "not_found" }
//! ```
//!
//! Storage and serialization failures are logged with their detail and
//! rendered as a generic 500 so internals never leak to callers.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::AuthError;
use crate::document::FlattenError;
use crate::webhook::signature::SignatureError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("malformed car document: {0}")]
    MalformedDocument(#[from] FlattenError),

    #[error("Invalid Signature")]
    InvalidSignature(#[from] SignatureError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) | Self::MalformedDocument(_) | Self::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(err) => err.code(),
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::MalformedDocument(_) => "malformed_document",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::Storage(_) | Self::Serialization(_) => "internal_error",
        }
    }
}

// redb splits its failures across several error types; every one of them
// folds into `redb::Error`.
macro_rules! storage_error_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for AppError {
                fn from(err: $source) -> Self {
                    Self::Storage(redb::Error::from(err))
                }
            }
        )+
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// Extractor rejections are answered with the API's JSON 400 body.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Unauthorized(err) => json!({
                "error": "Unauthorized",
                "message": err.to_string(),
                "code": err.code(),
            }),
            Self::InvalidSignature(err) => {
                tracing::warn!(error = %err, "webhook signature rejected");
                json!({
                    "error": "Invalid Signature",
                    "message": err.to_string(),
                    "code": self.code(),
                })
            }
            Self::Storage(_) | Self::Serialization(_) => {
                tracing::error!(error = %self, "request failed");
                json!({
                    "error": "Internal server error",
                    "code": self.code(),
                })
            }
            _ => json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
