// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Sign-up, sign-in, logout and verification-token endpoints.
use authgate_common::{
    ApiResponse, AuthStatus, ForgotPasswordRequest, ResendVerificationRequest,
    ResetPasswordRequest, SessionView, SignInRequest, SignInResponse, SignUpRequest, TokenRequest,
    UserView,
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::auth::PresentedCredential;
use super::JsonBody;
use crate::error::AppError;
use crate::middleware::{bearer_token, AuthUser};
use crate::AppState;

pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), AppError> {
    let user = state.auth.sign_up(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "account created, check your email to verify it",
            user,
        )),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignInRequest>,
) -> Result<Json<ApiResponse<SignInResponse>>, AppError> {
    let signed_in = state.auth.sign_in(&req.email, &req.password).await?;
    Ok(Json(ApiResponse::ok("signed in", signed_in)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let presented = PresentedCredential {
        token: bearer_token(&headers),
        expires_at: Some(user.expires_at),
    };
    state
        .auth
        .logout(user.user_id, &user.session_id, presented)
        .await?;
    Ok(Json(ApiResponse::message("logged out")))
}

pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let presented = PresentedCredential {
        token: bearer_token(&headers),
        expires_at: Some(user.expires_at),
    };
    let ended = state.auth.logout_all(user.user_id, presented).await?;
    Ok(Json(ApiResponse::ok(
        "logged out of all sessions",
        json!({ "sessions_ended": ended }),
    )))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<SessionView>>>, AppError> {
    let sessions = state
        .auth
        .list_sessions(user.user_id, &user.session_id)
        .await?;
    Ok(Json(ApiResponse::ok("active sessions", sessions)))
}

/// Reports the caller's identity when a valid credential is presented
pub async fn status(user: Option<AuthUser>) -> Json<ApiResponse<AuthStatus>> {
    let status = match user {
        Some(user) => AuthStatus {
            authenticated: true,
            user_id: Some(user.user_id),
            email: Some(user.email),
            role: Some(user.role),
        },
        None => AuthStatus::default(),
    };
    Json(ApiResponse::ok("auth status", status))
}

pub async fn verify_email(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TokenRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.verify_email(&req.token).await?;
    Ok(Json(ApiResponse::message("email verified")))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResendVerificationRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.resend_verification(&req.email).await?;
    Ok(Json(ApiResponse::message(
        "if the account is awaiting verification, a new link has been sent",
    )))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(ApiResponse::message(
        "if the account exists, a password reset link has been sent",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .auth
        .reset_password(&req.token, &req.password, &req.confirm_password)
        .await?;
    Ok(Json(ApiResponse::message("password has been reset")))
}

pub async fn verify_email_change(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TokenRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.auth.verify_email_change(&req.token).await?;
    Ok(Json(ApiResponse::message("email address updated")))
}
