//! Bearer credential encoding and decoding (HS256).
//!
//! The codec only checks signature, algorithm, issuer and expiry. It never
//! consults the session or revocation stores.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::error::AppError;

/// Lifetime of every issued credential
pub const CREDENTIAL_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Claims carried by every credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    /// Empty on credentials minted before session tracking existed
    #[serde(default)]
    pub session_id: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_session(&self) -> bool {
        !self.session_id.is_empty()
    }
}

/// A freshly signed credential
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub expires_at: i64,
}

/// Bad signature, wrong algorithm, malformed input and expiry all collapse
/// into this one error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid or expired token")]
pub struct InvalidCredential;

impl From<InvalidCredential> for AppError {
    fn from(_: InvalidCredential) -> Self {
        AppError::Unauthorized("invalid or expired token")
    }
}

/// Signs and verifies credentials with a key fixed at construction.
#[derive(Clone)]
pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtCodec {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(settings.secret.as_bytes(), settings.issuer.clone(), settings.ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build and sign claims expiring `ttl` from now.
    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
        session_id: &str,
    ) -> Result<IssuedCredential, AppError> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
            .ok_or_else(|| {
                tracing::error!(ttl_secs = self.ttl.as_secs(), "credential lifetime out of range");
                AppError::internal("failed to generate token")
            })?;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role: role.to_string(),
            session_id: session_id.to_string(),
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now,
            exp,
        };
        let token = self.sign(&claims)?;
        Ok(IssuedCredential {
            token,
            expires_at: claims.exp,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "credential signing failed");
            AppError::internal("failed to generate token")
        })
    }

    /// Verify signature, algorithm, issuer and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> Result<Claims, InvalidCredential> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "credential rejected");
                InvalidCredential
            })
    }
}
