//! HTTP error type for tutor-gate
//!
//! Messages are returned verbatim, provider bodies included, so a
//! misconfigured deployment can be diagnosed from the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::IdentityError;
use crate::services::{AccountError, AdminError, ImageError, SubmitError};
use crate::services::generation::GenerationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// 401
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 403
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// 409
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 429
    #[error("{message}")]
    QuotaExhausted { limit: u32, message: String },

    /// 502, provider failure after the retry policy gave up
    #[error("{message}")]
    Upstream { kind: &'static str, message: String },

    /// 500
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string(), msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string(), msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN".to_string(), msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string(), msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT".to_string(), msg),
            ApiError::QuotaExhausted { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "QUOTA_EXHAUSTED".to_string(),
                message,
            ),
            ApiError::Upstream { kind, message } => {
                (StatusCode::BAD_GATEWAY, kind.to_ascii_uppercase(), message)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("User {}", id)),
            StoreError::AlreadyExists(id) => ApiError::Conflict(format!("User {} already exists", id)),
            StoreError::PermissionDenied(_) => ApiError::Forbidden(err.to_string()),
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidIdentity(_)
            | AccountError::PasswordMismatch
            | AccountError::PasswordTooShort => ApiError::BadRequest(err.to_string()),
            AccountError::AlreadyRegistered(_) => ApiError::Conflict(err.to_string()),
            AccountError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AccountError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AccountError::Store(e) => e.into(),
            AccountError::Hashing(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::NotAdmin => ApiError::Forbidden(err.to_string()),
            AdminError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AdminError::Store(e) => e.into(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Configuration(msg) => ApiError::Internal(msg),
            other => ApiError::Upstream {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::QuotaExhausted { limit } => ApiError::QuotaExhausted {
                limit,
                message: err.to_string(),
            },
            SubmitError::Generation(e) => e.into(),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
