// ============================
// authgate-lib/src/router.rs
// ============================
//! HTTP routes.
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, health, me};
use crate::middleware::{optional_auth, require_auth};
use crate::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/verify-email", post(auth::verify_email))
        .route("/api/auth/resend-verification", post(auth::resend_verification))
        .route("/api/auth/verify-email-change", post(auth::verify_email_change));

    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/logout-all", post(auth::logout_all))
        .route("/api/auth/sessions", get(auth::list_sessions))
        .route("/api/me", get(me::get_me).put(me::update_me))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let personalized = Router::new()
        .route("/api/auth/status", get(auth::status))
        .route_layer(from_fn_with_state(state.clone(), optional_auth));

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(protected)
        .merge(personalized)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
