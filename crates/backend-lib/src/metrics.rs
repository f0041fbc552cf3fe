// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "auth.session.created";
pub const SESSION_DELETED: &str = "auth.session.deleted";
pub const TOKEN_REVOKED: &str = "auth.token.revoked";
pub const SIGNIN_ATTEMPT: &str = "auth.signin.attempt";
pub const SIGNUP_COMPLETED: &str = "auth.signup.completed";
pub const VERIFICATION_REDEEMED: &str = "auth.verification.redeemed";
/// Labelled with the `step` that rejected the request
pub const GUARD_REJECTED: &str = "auth.guard.rejected";
