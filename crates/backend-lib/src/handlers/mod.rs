// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers. Each one is a thin adapter over [`crate::auth::AuthService`].

pub mod auth;
pub mod me;

use authgate_common::ApiResponse;
use axum::{extract::FromRequest, Json};

use crate::error::AppError;

/// JSON request body whose rejections render as [`AppError`]
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Liveness probe
pub async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("ok"))
}
