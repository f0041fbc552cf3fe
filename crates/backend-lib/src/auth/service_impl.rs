use std::sync::Arc;

use async_trait::async_trait;
use authgate_common::{
    SessionView, SignInResponse, SignUpRequest, UpdateProfileRequest, UpdateProfileResponse,
    UserView,
};
use metrics::counter;
use uuid::Uuid;

use super::jwt::JwtCodec;
use super::password::{check_new_password, PasswordRequirements, ScryptHasher};
use super::revocation::{hash_token, token_ref, RevocationStore};
use super::service::{AuthService, PresentedCredential};
use super::session::SessionStore;
use super::token_generator::generate_session_id;
use super::verification::{TokenType, VerificationToken, VerificationTokenStore};
use crate::email::{mask_email, Mailer};
use crate::error::{AppError, StoreError};
use crate::metrics::{SIGNIN_ATTEMPT, SIGNUP_COMPLETED, VERIFICATION_REDEEMED};
use crate::users::{NewUser, ProfileFields, User, UserStore, DEFAULT_ROLE};
use crate::validation::{normalize_email, normalized_valid_email, validate_name, validate_phone};

/// Storage and delivery collaborators of [`DefaultAuth`]
#[derive(Clone)]
pub struct AuthCollaborators {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub tokens: Arc<dyn VerificationTokenStore>,
    pub mailer: Arc<dyn Mailer>,
}

pub struct DefaultAuth {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    revocations: Arc<dyn RevocationStore>,
    tokens: Arc<dyn VerificationTokenStore>,
    mailer: Arc<dyn Mailer>,
    codec: Arc<JwtCodec>,
    hasher: ScryptHasher,
    requirements: PasswordRequirements,
}

impl DefaultAuth {
    pub fn new(
        collaborators: AuthCollaborators,
        codec: Arc<JwtCodec>,
        hasher: ScryptHasher,
        requirements: PasswordRequirements,
    ) -> Self {
        let AuthCollaborators {
            users,
            sessions,
            revocations,
            tokens,
            mailer,
        } = collaborators;
        Self {
            users,
            sessions,
            revocations,
            tokens,
            mailer,
            codec,
            hasher,
            requirements,
        }
    }

    /// Replace any outstanding token of this type and store a fresh one
    async fn issue_token(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        new_email: Option<String>,
    ) -> Result<VerificationToken, AppError> {
        let replaced = self.tokens.delete_for_user(user_id, token_type).await?;
        if replaced > 0 {
            tracing::debug!(%user_id, %token_type, replaced, "replaced outstanding tokens");
        }

        let token = VerificationToken::issue(user_id, token_type, new_email);
        self.tokens.create(&token).await?;
        Ok(token)
    }

    /// Claim a token for redemption.
    ///
    /// A mistyped token is rejected on a plain read and left in place. The
    /// claim itself is an atomic take: one request wins, the rest see `invalid`.
    async fn claim(
        &self,
        raw: &str,
        expected: TokenType,
        invalid: fn() -> AppError,
    ) -> Result<VerificationToken, AppError> {
        if raw.trim().is_empty() {
            return Err(invalid());
        }

        let found = match self.tokens.find_valid(raw).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => return Err(invalid()),
            Err(e) => return Err(e.into()),
        };
        if found.token_type != expected {
            tracing::info!(
                token_ref = %token_ref(raw),
                expected = %expected,
                actual = %found.token_type,
                "token redeemed on the wrong path"
            );
            return Err(AppError::InvalidTokenType);
        }

        match self.tokens.take(raw, expected).await {
            Ok(token) => Ok(token),
            Err(StoreError::NotFound) => {
                tracing::info!(token_ref = %token_ref(raw), "token claimed by a concurrent request");
                Err(invalid())
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Count a finished redemption, or put the token back when its side
    /// effect failed so the owner can retry
    async fn settle(
        &self,
        token: &VerificationToken,
        outcome: Result<(), AppError>,
    ) -> Result<(), AppError> {
        match outcome {
            Ok(()) => {
                counter!(VERIFICATION_REDEEMED, "type" => token.token_type.as_str()).increment(1);
                tracing::info!(user_id = %token.user_id, token_type = %token.token_type, "token redeemed");
                Ok(())
            },
            Err(err) => {
                if let Err(e) = self.tokens.create(token).await {
                    tracing::warn!(
                        error = %e,
                        token_ref = %token_ref(&token.token),
                        "failed to restore token after a failed redemption"
                    );
                }
                Err(err)
            },
        }
    }

    /// Best-effort: a failed insert is logged and the caller proceeds
    async fn revoke(&self, presented: PresentedCredential<'_>) {
        let (Some(token), Some(expires_at)) = (presented.token, presented.expires_at) else {
            return;
        };
        if token.is_empty() {
            return;
        }

        if let Err(e) = self.revocations.add(&hash_token(token), expires_at).await {
            tracing::warn!(error = %e, token_ref = %token_ref(token), "failed to blacklist token");
        }
    }

    async fn user_by_id(&self, user_id: Uuid) -> Result<User, AppError> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(AppError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map a redemption side effect on a vanished user to the generic token error
fn missing_user_is(invalid: fn() -> AppError) -> impl Fn(StoreError) -> AppError {
    move |e| match e {
        StoreError::NotFound => invalid(),
        other => other.into(),
    }
}

fn invalid_token() -> AppError {
    AppError::InvalidToken
}

fn invalid_reset_token() -> AppError {
    AppError::InvalidResetToken
}

#[async_trait]
impl AuthService for DefaultAuth {
    #[tracing::instrument(skip_all)]
    async fn sign_up(&self, req: SignUpRequest) -> Result<UserView, AppError> {
        let email = normalized_valid_email(&req.email)?;
        check_new_password(&req.password, &req.confirm_password, &self.requirements)?;
        let name = req.name.unwrap_or_default().trim().to_string();
        validate_name(&name)?;

        match self.users.get_by_email_including_unverified(&email).await {
            Ok(_) => return Err(AppError::EmailExists),
            Err(StoreError::NotFound) => {},
            Err(e) => return Err(e.into()),
        }

        let password_hash = self.hasher.hash(&req.password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                role: DEFAULT_ROLE.to_string(),
                name,
                is_verified: false,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => AppError::EmailExists,
                other => other.into(),
            })?;
        counter!(SIGNUP_COMPLETED).increment(1);
        tracing::info!(user_id = %user.id, "account created");

        // The account stands even if the link cannot be issued or sent;
        // resend-verification recovers both cases.
        match self.issue_token(user.id, TokenType::EmailVerification, None).await {
            Ok(token) => {
                if let Err(e) = self
                    .mailer
                    .send_verification_email(&user.email, &token.token)
                    .await
                {
                    tracing::warn!(error = %e, user_id = %user.id, "failed to send verification email");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id, "failed to create verification token");
            },
        }

        Ok(UserView::from(&user))
    }

    #[tracing::instrument(skip_all)]
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResponse, AppError> {
        let email = normalize_email(email);

        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                counter!(SIGNIN_ATTEMPT, "outcome" => "unknown_user").increment(1);
                return Err(AppError::UserNotFound);
            },
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(&user.password_hash, password).await? {
            counter!(SIGNIN_ATTEMPT, "outcome" => "bad_password").increment(1);
            tracing::info!(user_id = %user.id, "sign-in rejected");
            return Err(AppError::InvalidCredentials);
        }

        let session_id = generate_session_id();
        let credential = self
            .codec
            .issue(user.id, &user.email, &user.role, &session_id)?;

        if let Err(e) = self
            .sessions
            .put(user.id, &session_id, &credential.token)
            .await
        {
            tracing::error!(error = %e, user_id = %user.id, "failed to persist session");
            return Err(AppError::SessionCreation);
        }

        counter!(SIGNIN_ATTEMPT, "outcome" => "success").increment(1);
        tracing::info!(user_id = %user.id, %session_id, "signed in");

        Ok(SignInResponse {
            token: credential.token,
            session_id,
            expires_at: credential.expires_at,
            user: UserView::from(&user),
        })
    }

    #[tracing::instrument(skip(self, presented))]
    async fn logout(
        &self,
        user_id: Uuid,
        session_id: &str,
        presented: PresentedCredential<'_>,
    ) -> Result<(), AppError> {
        if !session_id.is_empty() {
            self.sessions.delete(user_id, session_id).await?;
        }
        self.revoke(presented).await;

        tracing::info!("logged out");
        Ok(())
    }

    #[tracing::instrument(skip(self, presented))]
    async fn logout_all(
        &self,
        user_id: Uuid,
        presented: PresentedCredential<'_>,
    ) -> Result<u64, AppError> {
        let removed = self.sessions.delete_all(user_id).await?;
        self.revoke(presented).await;

        tracing::info!(removed, "logged out everywhere");
        Ok(removed)
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        current_session_id: &str,
    ) -> Result<Vec<SessionView>, AppError> {
        let sessions = self.sessions.list(user_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| SessionView {
                current: !current_session_id.is_empty() && s.session_id == current_session_id,
                session_id: s.session_id,
                created_at: s.created_at,
                expires_at: s.expires_at,
            })
            .collect())
    }

    #[tracing::instrument(skip_all)]
    async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        let record = self
            .claim(token, TokenType::EmailVerification, invalid_token)
            .await?;

        let outcome = self
            .users
            .update_verification_status(record.user_id, true)
            .await
            .map_err(missing_user_is(invalid_token));
        self.settle(&record, outcome).await
    }

    #[tracing::instrument(skip_all)]
    async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let email = normalized_valid_email(email)?;

        let user = match self.users.get_by_email_including_unverified(&email).await {
            Ok(user) if !user.is_verified => user,
            Ok(_) | Err(StoreError::NotFound) => {
                tracing::debug!(to = %mask_email(&email), "resend skipped");
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        let token = self
            .issue_token(user.id, TokenType::EmailVerification, None)
            .await?;
        if let Err(e) = self
            .mailer
            .send_verification_email(&user.email, &token.token)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "failed to send verification email");
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = normalized_valid_email(email)?;

        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                tracing::debug!(to = %mask_email(&email), "password reset skipped");
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        let token = self
            .issue_token(user.id, TokenType::PasswordReset, None)
            .await?;
        if let Err(e) = self
            .mailer
            .send_password_reset_email(&user.email, &token.token)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "failed to send password reset email");
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), AppError> {
        check_new_password(password, confirm_password, &self.requirements)?;

        let record = self
            .claim(token, TokenType::PasswordReset, invalid_reset_token)
            .await?;

        let outcome = async {
            let password_hash = self.hasher.hash(password).await?;
            self.users
                .update_password(record.user_id, &password_hash)
                .await
                .map_err(missing_user_is(invalid_reset_token))
        }
        .await;
        self.settle(&record, outcome).await
    }

    #[tracing::instrument(skip(self, req))]
    async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<UpdateProfileResponse, AppError> {
        let user = self.user_by_id(user_id).await?;

        let name = match req.name {
            Some(name) => {
                let name = name.trim().to_string();
                validate_name(&name)?;
                name
            },
            None => user.name.clone(),
        };
        let phone = match req.phone {
            Some(phone) => {
                let phone = phone.trim().to_string();
                validate_phone(&phone)?;
                (!phone.is_empty()).then_some(phone)
            },
            None => user.phone.clone(),
        };
        let new_email = match req.email {
            Some(email) => {
                let email = normalized_valid_email(&email)?;
                (email != user.email).then_some(email)
            },
            None => None,
        };

        let email_change_pending = new_email.is_some();
        if let Some(new_email) = new_email {
            match self.users.get_by_email_including_unverified(&new_email).await {
                Ok(owner) if owner.id != user.id => return Err(AppError::EmailExists),
                Ok(_) | Err(StoreError::NotFound) => {},
                Err(e) => return Err(e.into()),
            }

            let token = self
                .issue_token(user.id, TokenType::EmailChange, Some(new_email.clone()))
                .await?;
            if let Err(e) = self
                .mailer
                .send_email_change_verification_email(&new_email, &token.token)
                .await
            {
                tracing::warn!(error = %e, %user_id, "failed to send email change verification");
            }

            self.users
                .update_verification_status(user.id, false)
                .await?;
            tracing::info!(%user_id, to = %mask_email(&new_email), "email change staged");
        }

        let updated = self
            .users
            .update_profile(user.id, &ProfileFields { name, phone })
            .await?;

        Ok(UpdateProfileResponse {
            user: UserView::from(&updated),
            email_change_pending,
        })
    }

    #[tracing::instrument(skip_all)]
    async fn verify_email_change(&self, token: &str) -> Result<(), AppError> {
        let record = self
            .claim(token, TokenType::EmailChange, invalid_token)
            .await?;
        let Some(new_email) = record.new_email.as_deref() else {
            tracing::error!(user_id = %record.user_id, "email change token without address");
            return Err(AppError::InvalidToken);
        };

        let outcome = async {
            self.users
                .update_email(record.user_id, new_email)
                .await
                .map_err(|e| match e {
                    StoreError::Conflict => AppError::EmailExists,
                    other => missing_user_is(invalid_token)(other),
                })?;
            self.users
                .update_verification_status(record.user_id, true)
                .await
                .map_err(missing_user_is(invalid_token))
        }
        .await;
        self.settle(&record, outcome).await
    }

    async fn current_user(&self, user_id: Uuid) -> Result<UserView, AppError> {
        let user = self.user_by_id(user_id).await?;
        Ok(UserView::from(&user))
    }
}
