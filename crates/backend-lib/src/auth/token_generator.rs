// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
/** Secure token generation for authentication
This module provides cryptographically secure values for single-use
verification tokens and identifiers for sessions. */
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/** Generate a cryptographically secure random token
This uses OS-provided entropy. The value is suitable for emailed
verification, password-reset and email-change links.
# Returns
A lowercase hex string (64 characters) */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A lowercase hex string of `2 * bytes` characters */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    hex::encode(buffer)
}

/// A fresh session identifier, unique per sign-in.
///
/// Not secret: it is only meaningful together with the signed credential
/// that embeds it.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
