//! Revocation (blacklist) of individual credentials.
//!
//! Entries are keyed by the SHA-256 of the raw credential and live only
//! until the credential would have expired on its own.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::kv::{with_deadline, KeyValueStore};
use crate::metrics::TOKEN_REVOKED;

/// Hex SHA-256 of a raw credential
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Short hash prefix used to refer to a credential in logs
pub fn token_ref(token: &str) -> String {
    let mut hash = hash_token(token);
    hash.truncate(12);
    hash
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoke until `expires_at_unix`. Already-expired credentials are skipped.
    async fn add(&self, token_hash: &str, expires_at_unix: i64) -> Result<(), StoreError>;

    async fn is_revoked(&self, token_hash: &str) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct KvRevocationStore {
    kv: Arc<dyn KeyValueStore>,
    op_timeout: Duration,
}

impl KvRevocationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, op_timeout: Duration) -> Self {
        Self { kv, op_timeout }
    }

    fn key(token_hash: &str) -> String {
        format!("blacklist:{token_hash}")
    }
}

#[async_trait]
impl RevocationStore for KvRevocationStore {
    async fn add(&self, token_hash: &str, expires_at_unix: i64) -> Result<(), StoreError> {
        let remaining = expires_at_unix - Utc::now().timestamp();
        if remaining <= 0 {
            return Ok(());
        }

        let ttl = Duration::from_secs(remaining as u64);
        let value = expires_at_unix.to_string();
        with_deadline(
            self.op_timeout,
            self.kv.set_ex(&Self::key(token_hash), &value, ttl),
        )
        .await?;

        counter!(TOKEN_REVOKED).increment(1);
        Ok(())
    }

    async fn is_revoked(&self, token_hash: &str) -> Result<bool, StoreError> {
        with_deadline(self.op_timeout, self.kv.exists(&Self::key(token_hash))).await
    }
}
