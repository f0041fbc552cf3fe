// ============================
// authgate-lib/src/auth/session.rs
// ============================
//! Server-side session tracking.
//!
//! A session record maps `(user_id, session_id)` to the exact credential
//! string issued for it. A per-user hash indexes the active session ids so
//! they can be listed or deleted together. Both expire after the session TTL
//! set at creation; use does not extend them.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::kv::{with_deadline, KeyValueStore};
use crate::metrics::{SESSION_CREATED, SESSION_DELETED};

/// Session TTL (time to live)
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24); // 24 hours

/// Metadata kept in the per-user session index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionMeta {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Storage of the currently valid credential per session
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record `token` as the credential of this session
    async fn put(&self, user_id: Uuid, session_id: &str, token: &str) -> Result<(), StoreError>;

    /// The stored credential, or `StoreError::NotFound`
    async fn get(&self, user_id: Uuid, session_id: &str) -> Result<String, StoreError>;

    /// True iff the session exists and stores exactly `token`
    async fn validate(
        &self,
        user_id: Uuid,
        session_id: &str,
        token: &str,
    ) -> Result<bool, StoreError> {
        match self.get(user_id, session_id).await {
            Ok(stored) => Ok(stored == token),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove a session and its index entry. Absent sessions are not an error.
    async fn delete(&self, user_id: Uuid, session_id: &str) -> Result<(), StoreError>;

    /// Remove every session of the user, returning how many were removed
    async fn delete_all(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// Active sessions of the user, newest first
    async fn list(&self, user_id: Uuid) -> Result<Vec<SessionInfo>, StoreError>;
}

/// [`SessionStore`] on top of any [`KeyValueStore`]
#[derive(Clone)]
pub struct KvSessionStore {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
    op_timeout: Duration,
}

impl KvSessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl: Duration, op_timeout: Duration) -> Self {
        Self {
            kv,
            ttl,
            op_timeout,
        }
    }

    fn session_key(user_id: Uuid, session_id: &str) -> String {
        format!("session:{user_id}:{session_id}")
    }

    fn index_key(user_id: Uuid) -> String {
        format!("user_sessions:{user_id}")
    }
}

#[async_trait]
impl SessionStore for KvSessionStore {
    async fn put(&self, user_id: Uuid, session_id: &str, token: &str) -> Result<(), StoreError> {
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(self.ttl)
                .map_err(|e| StoreError::Backend(format!("session ttl out of range: {e}")))?;
        let meta = serde_json::to_string(&SessionMeta {
            created_at,
            expires_at,
        })
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let session_key = Self::session_key(user_id, session_id);
        let index_key = Self::index_key(user_id);

        with_deadline(self.op_timeout, self.kv.set_ex(&session_key, token, self.ttl)).await?;
        with_deadline(self.op_timeout, self.kv.hset(&index_key, session_id, &meta)).await?;
        with_deadline(self.op_timeout, self.kv.expire(&index_key, self.ttl)).await?;

        counter!(SESSION_CREATED).increment(1);
        Ok(())
    }

    async fn get(&self, user_id: Uuid, session_id: &str) -> Result<String, StoreError> {
        let key = Self::session_key(user_id, session_id);
        with_deadline(self.op_timeout, self.kv.get(&key))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, user_id: Uuid, session_id: &str) -> Result<(), StoreError> {
        let key = Self::session_key(user_id, session_id);
        let removed = with_deadline(self.op_timeout, self.kv.del(&[key])).await?;
        with_deadline(
            self.op_timeout,
            self.kv.hdel(&Self::index_key(user_id), session_id),
        )
        .await?;

        counter!(SESSION_DELETED).increment(removed);
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let index_key = Self::index_key(user_id);
        let index = with_deadline(self.op_timeout, self.kv.hgetall(&index_key)).await?;

        let mut keys: Vec<String> = index
            .keys()
            .map(|session_id| Self::session_key(user_id, session_id))
            .collect();
        let session_count = keys.len() as u64;
        keys.push(index_key);

        with_deadline(self.op_timeout, self.kv.del(&keys)).await?;

        counter!(SESSION_DELETED).increment(session_count);
        Ok(session_count)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<SessionInfo>, StoreError> {
        let index = with_deadline(self.op_timeout, self.kv.hgetall(&Self::index_key(user_id))).await?;
        let now = Utc::now();

        let mut sessions: Vec<SessionInfo> = index
            .into_iter()
            .filter_map(|(session_id, raw)| match serde_json::from_str::<SessionMeta>(&raw) {
                Ok(meta) => Some(SessionInfo {
                    session_id,
                    created_at: meta.created_at,
                    expires_at: meta.expires_at,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, %user_id, "skipping unreadable session index entry");
                    None
                },
            })
            // The index TTL is refreshed by newer sign-ins, so stale entries can outlive their session
            .filter(|info| info.expires_at > now)
            .collect();

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}
