use async_trait::async_trait;
use authgate_common::{
    SessionView, SignInResponse, SignUpRequest, UpdateProfileRequest, UpdateProfileResponse,
    UserView,
};
use uuid::Uuid;

use crate::error::AppError;

/// The credential presented on the current request, as the guard saw it.
///
/// Both fields are optional so callers without a raw credential (internal
/// tooling, tests) can still end sessions; revocation is then skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentedCredential<'a> {
    pub token: Option<&'a str>,
    pub expires_at: Option<i64>,
}

/// Account and session lifecycle operations.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an unverified account and mail a verification link
    async fn sign_up(&self, req: SignUpRequest) -> Result<UserView, AppError>;

    /// Start a new session for a verified account
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResponse, AppError>;

    /// End one session. Deleting an absent session succeeds.
    async fn logout(
        &self,
        user_id: Uuid,
        session_id: &str,
        presented: PresentedCredential<'_>,
    ) -> Result<(), AppError>;

    /// End every session of the user, returning how many were removed
    async fn logout_all(
        &self,
        user_id: Uuid,
        presented: PresentedCredential<'_>,
    ) -> Result<u64, AppError>;

    async fn list_sessions(
        &self,
        user_id: Uuid,
        current_session_id: &str,
    ) -> Result<Vec<SessionView>, AppError>;

    async fn verify_email(&self, token: &str) -> Result<(), AppError>;

    /// Silently succeeds for unknown or already-verified accounts
    async fn resend_verification(&self, email: &str) -> Result<(), AppError>;

    /// Silently succeeds for unknown or unverified accounts
    async fn forgot_password(&self, email: &str) -> Result<(), AppError>;

    async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), AppError>;

    /// Apply profile fields. A changed email is staged, not written.
    async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<UpdateProfileResponse, AppError>;

    /// Commit a staged email change
    async fn verify_email_change(&self, token: &str) -> Result<(), AppError>;

    async fn current_user(&self, user_id: Uuid) -> Result<UserView, AppError>;
}
