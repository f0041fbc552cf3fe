// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use authgate_common::ApiResponse;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors surfaced by the storage collaborators (key-value store,
/// user records, verification tokens).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record conflicts with an existing one")]
    Conflict,

    #[error("store operation timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input. The message is shown to the caller verbatim.
    #[error("{0}")]
    Validation(String),

    #[error("user not found")]
    UserNotFound,

    #[error("invalid email or password")]
    InvalidCredentials,

    /// Request guard rejection; the reason is one of a fixed set of messages.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid or expired reset token")]
    InvalidResetToken,

    #[error("invalid token type")]
    InvalidTokenType,

    #[error("email already exists")]
    EmailExists,

    #[error("failed to create session")]
    SessionCreation,

    #[error("store operation timed out")]
    StoreTimeout,

    #[error("store error: {0}")]
    Store(String),

    /// Dependent-system failure. The payload is a short "failed to ..."
    /// context; the underlying cause is logged where it happened.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidToken | AppError::InvalidResetToken | AppError::InvalidTokenType => {
                StatusCode::BAD_REQUEST
            },
            AppError::EmailExists => StatusCode::CONFLICT,
            AppError::SessionCreation
            | AppError::StoreTimeout
            | AppError::Store(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VAL_001",
            AppError::UserNotFound => "AUTH_001",
            AppError::InvalidCredentials => "AUTH_002",
            AppError::Unauthorized(_) => "AUTH_003",
            AppError::InvalidToken => "TOKEN_001",
            AppError::InvalidResetToken => "TOKEN_002",
            AppError::InvalidTokenType => "TOKEN_003",
            AppError::EmailExists => "CONFLICT_001",
            AppError::SessionCreation => "SESSION_001",
            AppError::StoreTimeout => "STORE_001",
            AppError::Store(_) => "STORE_002",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for returning to the caller
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::StoreTimeout => "service temporarily unavailable, please retry".to_string(),
            AppError::Store(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreTimeout)
    }

    /// Build an `Internal` error from a "failed to ..." context
    pub fn internal(context: impl Into<String>) -> Self {
        AppError::Internal(context.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => AppError::StoreTimeout,
            StoreError::Conflict => AppError::Store("unexpected record conflict".to_string()),
            StoreError::NotFound => AppError::Store("unexpected missing record".to_string()),
            StoreError::Backend(msg) => AppError::Store(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }

        let body = ApiResponse::<()>::message(self.sanitized_message());
        (status, Json(body)).into_response()
    }
}
