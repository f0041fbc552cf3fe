//! Request guard for bearer credentials.
//!
//! Checks run in a fixed order and stop at the first failure:
//! bearer header, signature, revocation, then session match.
use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use uuid::Uuid;

use crate::auth::{hash_token, revocation::token_ref};
use crate::error::AppError;
use crate::metrics::GUARD_REJECTED;
use crate::AppState;

const MISSING_CREDENTIAL: &str = "missing or malformed authorization header";
const INVALID_CREDENTIAL: &str = "invalid or expired token";
const REVOKED_CREDENTIAL: &str = "token has been revoked";
const SESSION_INVALID: &str = "session expired or invalid";

/// Identity attached to requests that passed the guard
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    /// Empty for sessionless credentials
    pub session_id: String,
    /// Credential expiry, epoch seconds
    pub expires_at: i64,
}

/// The step at which a credential was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    MissingCredential,
    InvalidCredential,
    Revoked,
    SessionInvalid,
}

impl GuardRejection {
    pub fn step(&self) -> &'static str {
        match self {
            GuardRejection::MissingCredential => "header",
            GuardRejection::InvalidCredential => "signature",
            GuardRejection::Revoked => "revocation",
            GuardRejection::SessionInvalid => "session",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            GuardRejection::MissingCredential => MISSING_CREDENTIAL,
            GuardRejection::InvalidCredential => INVALID_CREDENTIAL,
            GuardRejection::Revoked => REVOKED_CREDENTIAL,
            GuardRejection::SessionInvalid => SESSION_INVALID,
        }
    }
}

impl From<GuardRejection> for AppError {
    fn from(rejection: GuardRejection) -> Self {
        AppError::Unauthorized(rejection.reason())
    }
}

/// The credential of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn reject(rejection: GuardRejection) -> AppError {
    counter!(GUARD_REJECTED, "step" => rejection.step()).increment(1);
    rejection.into()
}

/// Run the full validation chain against the request headers.
///
/// Store failures surface as errors of their own, never as a pass.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers).ok_or_else(|| reject(GuardRejection::MissingCredential))?;

    let claims = state
        .codec
        .validate(token)
        .map_err(|_| reject(GuardRejection::InvalidCredential))?;

    if state.revocations.is_revoked(&hash_token(token)).await? {
        tracing::debug!(user_id = %claims.user_id, token_ref = %token_ref(token), "revoked credential presented");
        return Err(reject(GuardRejection::Revoked));
    }

    if claims.has_session() {
        let matches = state
            .sessions
            .validate(claims.user_id, &claims.session_id, token)
            .await?;
        if !matches {
            return Err(reject(GuardRejection::SessionInvalid));
        }
    } else if !state.settings.allow_sessionless_tokens {
        return Err(reject(GuardRejection::SessionInvalid));
    } else {
        tracing::debug!(user_id = %claims.user_id, "accepted sessionless credential");
    }

    Ok(AuthUser {
        user_id: claims.user_id,
        email: claims.email,
        role: claims.role,
        session_id: claims.session_id,
        expires_at: claims.exp,
    })
}

/// Reject unauthenticated requests with 401
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Attach the identity when the credential checks out, otherwise continue
/// anonymously.
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
        },
        Err(AppError::Unauthorized(reason)) => {
            tracing::trace!(reason, "continuing anonymously");
        },
        Err(e) => {
            tracing::warn!(error = %e, "guard check failed, continuing anonymously");
        },
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized(MISSING_CREDENTIAL))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}
