// ============================
// authgate-lib/src/auth/verification.rs
// ============================
//! Single-use, typed, expiring verification tokens.
//!
//! A token is created in response to an action (sign-up, forgot-password,
//! email change), looked up by its raw value, and deleted as soon as it is
//! redeemed. Lookups never return expired tokens and never mutate state.
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token_generator::generate_secure_token;
use crate::error::StoreError;

/// Lifetime of email verification and email change tokens
pub const EMAIL_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Lifetime of password reset tokens
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    EmailVerification,
    PasswordReset,
    EmailChange,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::EmailVerification => "email_verification",
            TokenType::PasswordReset => "password_reset",
            TokenType::EmailChange => "email_change",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            TokenType::PasswordReset => RESET_TOKEN_TTL,
            TokenType::EmailVerification | TokenType::EmailChange => EMAIL_TOKEN_TTL,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verification" => Ok(TokenType::EmailVerification),
            "password_reset" => Ok(TokenType::PasswordReset),
            "email_change" => Ok(TokenType::EmailChange),
            other => Err(StoreError::Backend(format!("unknown token type: {other}"))),
        }
    }
}

/// One row of the `verification_tokens` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    /// 64 hex characters, 256 bits from the OS CSPRNG
    pub token: String,
    pub token_type: TokenType,
    /// Only set on `email_change` tokens
    pub new_email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Mint a fresh token expiring after the type's lifetime
    pub fn issue(user_id: Uuid, token_type: TokenType, new_email: Option<String>) -> Self {
        let ttl = chrono::Duration::from_std(token_type.ttl())
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        Self {
            id: Uuid::new_v4(),
            user_id,
            token: generate_secure_token(),
            token_type,
            new_email,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait VerificationTokenStore: Send + Sync {
    async fn create(&self, token: &VerificationToken) -> Result<(), StoreError>;

    /// Look up by raw value. Missing and expired tokens are both `NotFound`.
    async fn find_valid(&self, token: &str) -> Result<VerificationToken, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Atomically remove and return a live token of `token_type`.
    ///
    /// Of any number of concurrent callers presenting the same value, at most
    /// one gets the token back; the rest see `NotFound`, as do callers
    /// presenting an expired token or one of another type.
    async fn take(&self, token: &str, token_type: TokenType) -> Result<VerificationToken, StoreError>;

    /// Drop outstanding tokens of one type for a user
    async fn delete_for_user(&self, user_id: Uuid, token_type: TokenType) -> Result<u64, StoreError>;
}

/// In-memory [`VerificationTokenStore`], keyed by raw token value
#[derive(Debug, Clone, Default)]
pub struct MemoryVerificationTokenStore {
    tokens: Arc<DashMap<String, VerificationToken>>,
}

impl MemoryVerificationTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored token of a user, expired ones included
    pub fn tokens_for(&self, user_id: Uuid) -> Vec<VerificationToken> {
        self.tokens
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl VerificationTokenStore for MemoryVerificationTokenStore {
    async fn create(&self, token: &VerificationToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            },
        }
    }

    async fn find_valid(&self, token: &str) -> Result<VerificationToken, StoreError> {
        match self.tokens.get(token) {
            Some(found) if !found.is_expired_at(Utc::now()) => Ok(found.value().clone()),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.tokens.retain(|_, t| t.id != id);
        Ok(())
    }

    async fn take(&self, token: &str, token_type: TokenType) -> Result<VerificationToken, StoreError> {
        let now = Utc::now();
        self.tokens
            .remove_if(token, |_, t| t.token_type == token_type && !t.is_expired_at(now))
            .map(|(_, taken)| taken)
            .ok_or(StoreError::NotFound)
    }

    async fn delete_for_user(&self, user_id: Uuid, token_type: TokenType) -> Result<u64, StoreError> {
        let before = self.tokens.len();
        self.tokens
            .retain(|_, t| !(t.user_id == user_id && t.token_type == token_type));
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}
