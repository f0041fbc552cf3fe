// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `authgate` clients and the server.
//! This module defines the JSON request bodies and the response envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every JSON response body.
///
/// Errors use the same shape with `data: null`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying a payload
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }

    /// Response carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

/// Create a new account
/// # Fields
/// * `email` - Address the verification mail is sent to
/// * `password` - Plain password (min 8 chars by default)
/// * `confirm_password` - Must equal `password`
/// * `name` - Optional display name
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Returned by a successful sign-in
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignInResponse {
    pub token: String,
    pub session_id: String,
    /// Credential expiry as epoch seconds
    pub expires_at: i64,
    pub user: UserView,
}

/// Public projection of a user record. Never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub name: String,
    pub phone: Option<String>,
    pub is_verified: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// Body for endpoints that redeem a single-use token
/// (email verification and email change).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenRequest {
    pub token: String,
}

/// Partial profile update. Absent fields keep their current value.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateProfileResponse {
    pub user: UserView,
    /// True when a changed email is waiting for confirmation
    pub email_change_pending: bool,
}

/// One entry of the caller's active-session listing
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Whether this is the session of the requesting credential
    pub current: bool,
}

/// Response of the optional-auth status endpoint
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: Option<String>,
}
