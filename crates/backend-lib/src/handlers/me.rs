// ============================
// crates/backend-lib/src/handlers/me.rs
// ============================
//! The caller's own account.
use authgate_common::{ApiResponse, UpdateProfileRequest, UpdateProfileResponse, UserView};
use axum::{extract::State, Json};

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::AppState;

pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserView>>, AppError> {
    let view = state.auth.current_user(user.user_id).await?;
    Ok(Json(ApiResponse::ok("current user", view)))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UpdateProfileResponse>>, AppError> {
    let updated = state.auth.update_profile(user.user_id, req).await?;
    let message = if updated.email_change_pending {
        "profile updated, confirm the new email address to complete the change"
    } else {
        "profile updated"
    };
    Ok(Json(ApiResponse::ok(message, updated)))
}
