// ============================
// authgate-lib/src/kv.rs
// ============================
//! Key-value store abstraction with an in-memory implementation.
//!
//! Session and revocation state live behind [`KeyValueStore`]. Every
//! operation is single-key and atomic with respect to that key; callers never
//! read-modify-write a key they do not own for the current step.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::StoreError;

/// Trait for TTL-capable key-value backends
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a string value
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a string value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Set one field of a hash, creating the hash if needed
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// All fields of a hash; empty when the hash is absent
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError>;

    /// (Re)set the TTL of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// Run a store call under a deadline. Elapsed deadlines are failures.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process implementation of [`KeyValueStore`]
///
/// Expired keys are invisible to readers immediately and are physically
/// removed either on access or by the reaper task.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the periodic sweep of expired keys
    pub fn start_reaper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = store.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "purged expired keys");
                }
            }
        })
    }

    /// Remove every expired key, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of keys currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        None
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.live_value(key) {
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(Value::Hash(_)) => Err(StoreError::Backend(format!(
                "wrong type for key {key}: expected string"
            ))),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_value(key).is_some())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            };
        }
        match &mut entry.value {
            Value::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            },
            Value::Str(_) => Err(StoreError::Backend(format!(
                "wrong type for key {key}: expected hash"
            ))),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.live_value(key) {
            Some(Value::Hash(map)) => Ok(map),
            Some(Value::Str(_)) => Err(StoreError::Backend(format!(
                "wrong type for key {key}: expected hash"
            ))),
            None => Ok(HashMap::new()),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if let Value::Hash(map) = &mut entry.value {
                map.remove(field);
            }
        }
        // An emptied hash disappears, like in Redis
        self.entries.remove_if(key, |_, entry| match &entry.value {
            Value::Hash(map) => map.is_empty() || !entry.is_live(now),
            Value::Str(_) => false,
        });
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}
