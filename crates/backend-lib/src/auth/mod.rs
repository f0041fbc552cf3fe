// ============================
// authgate-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod jwt;
pub mod password;
pub mod revocation;
pub mod session;
pub mod token_generator;
pub mod verification;
#[cfg(feature = "postgres")]
pub mod verification_pg;
mod service;
mod service_impl;

pub use jwt::{Claims, IssuedCredential, InvalidCredential, JwtCodec, CREDENTIAL_TTL};
pub use password::{check_new_password, PasswordRequirements, ScryptHasher, MIN_PASSWORD_LENGTH};
pub use revocation::{hash_token, KvRevocationStore, RevocationStore};
pub use service::{AuthService, PresentedCredential};
pub use service_impl::{AuthCollaborators, DefaultAuth};
pub use session::{KvSessionStore, SessionInfo, SessionStore, SESSION_TTL};
pub use verification::{
    MemoryVerificationTokenStore, TokenType, VerificationToken, VerificationTokenStore,
};
#[cfg(feature = "postgres")]
pub use verification_pg::PgVerificationTokenStore;
