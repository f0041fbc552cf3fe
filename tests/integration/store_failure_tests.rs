use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authgate_lib::{
    auth::{
        AuthCollaborators, AuthService, DefaultAuth, JwtCodec, KvSessionStore,
        MemoryVerificationTokenStore, PasswordRequirements, PresentedCredential, RevocationStore,
        ScryptHasher, SessionStore,
    },
    error::{AppError, StoreError},
    kv::{KeyValueStore, MemoryKvStore},
    users::MemoryUserStore,
};
use axum::http::{Method, StatusCode};

use crate::test_utils::{
    seed_user, send, setup_with_kv, test_settings, RecordingMailer, SEEDED_EMAIL,
    SEEDED_PASSWORD, TEST_SECRET,
};

/// Key-value backend whose calls never complete
struct StalledKv;

#[async_trait]
impl KeyValueStore for StalledKv {
    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        std::future::pending().await
    }
    async fn set_ex(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        std::future::pending().await
    }
    async fn exists(&self, _: &str) -> Result<bool, StoreError> {
        std::future::pending().await
    }
    async fn del(&self, _: &[String]) -> Result<u64, StoreError> {
        std::future::pending().await
    }
    async fn hset(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
        std::future::pending().await
    }
    async fn hgetall(&self, _: &str) -> Result<HashMap<String, String>, StoreError> {
        std::future::pending().await
    }
    async fn hdel(&self, _: &str, _: &str) -> Result<(), StoreError> {
        std::future::pending().await
    }
    async fn expire(&self, _: &str, _: Duration) -> Result<bool, StoreError> {
        std::future::pending().await
    }
}

/// Revocation store that is always down
struct BrokenRevocations;

#[async_trait]
impl RevocationStore for BrokenRevocations {
    async fn add(&self, _: &str, _: i64) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    async fn is_revoked(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

fn fast_timeout_settings() -> authgate_lib::config::Settings {
    let mut settings = test_settings();
    settings.kv.op_timeout_ms = 50;
    settings
}

#[tokio::test]
async fn test_session_write_timeout_fails_sign_in() {
    let (state, _) = setup_with_kv(fast_timeout_settings(), Arc::new(StalledKv)).await;

    let err = state
        .auth
        .sign_in(SEEDED_EMAIL, SEEDED_PASSWORD)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SessionCreation));
    assert_eq!(err.to_string(), "failed to create session");
}

#[tokio::test]
async fn test_guard_timeout_is_an_error_not_a_pass() {
    let (state, seeded) = setup_with_kv(fast_timeout_settings(), Arc::new(StalledKv)).await;
    let credential = state
        .codec
        .issue(seeded.id, SEEDED_EMAIL, "user", "some-session")
        .unwrap();

    let app = authgate_lib::create_router(state);
    let (status, body) = send(app, Method::GET, "/api/me", Some(&credential.token), None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "service temporarily unavailable, please retry");
    assert_eq!(body["data"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_logout_timeout_is_retryable() {
    let (state, seeded) = setup_with_kv(fast_timeout_settings(), Arc::new(StalledKv)).await;

    let err = state
        .auth
        .logout(seeded.id, "some-session", PresentedCredential::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::StoreTimeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_logout_succeeds_when_blacklist_is_down() {
    let kv = Arc::new(MemoryKvStore::new());
    let sessions: Arc<dyn SessionStore> = Arc::new(KvSessionStore::new(
        kv,
        Duration::from_secs(3600),
        Duration::from_secs(2),
    ));
    let users = MemoryUserStore::new();
    let seeded = seed_user(&users, SEEDED_EMAIL, SEEDED_PASSWORD, true).await;

    let auth = DefaultAuth::new(
        AuthCollaborators {
            users: Arc::new(users),
            sessions: sessions.clone(),
            revocations: Arc::new(BrokenRevocations),
            tokens: Arc::new(MemoryVerificationTokenStore::new()),
            mailer: Arc::new(RecordingMailer::default()),
        },
        Arc::new(JwtCodec::new(
            TEST_SECRET.as_bytes(),
            "authgate",
            Duration::from_secs(3600),
        )),
        ScryptHasher::new(10).unwrap(),
        PasswordRequirements::default(),
    );

    let signed_in = auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD).await.unwrap();
    auth.logout(
        seeded.id,
        &signed_in.session_id,
        PresentedCredential {
            token: Some(&signed_in.token),
            expires_at: Some(signed_in.expires_at),
        },
    )
    .await
    .unwrap();

    assert!(!sessions
        .validate(seeded.id, &signed_in.session_id, &signed_in.token)
        .await
        .unwrap());
}
