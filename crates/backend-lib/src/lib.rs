// ============================
// authgate-lib/src/lib.rs
// ============================
//! Core of the `authgate` authentication server.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod users;
pub mod validation;

use std::sync::Arc;

use crate::auth::{
    AuthCollaborators, AuthService, DefaultAuth, JwtCodec, KvRevocationStore, KvSessionStore,
    MemoryVerificationTokenStore, PasswordRequirements, RevocationStore, ScryptHasher,
    SessionStore, VerificationTokenStore,
};
use crate::config::Settings;
use crate::email::{LogMailer, Mailer};
use crate::error::AppError;
use crate::kv::{KeyValueStore, MemoryKvStore};
use crate::users::{MemoryUserStore, UserStore};

pub use router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Credential codec, shared with the orchestrator
    pub codec: Arc<JwtCodec>,
    pub sessions: Arc<dyn SessionStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub settings: Arc<Settings>,
}

/// Storage and delivery backends the state is assembled from
#[derive(Clone)]
pub struct Backends {
    pub kv: Arc<dyn KeyValueStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn VerificationTokenStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl Backends {
    /// Everything in process, mail written to the log
    pub fn in_memory(settings: &Settings) -> Self {
        Self {
            kv: Arc::new(MemoryKvStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            tokens: Arc::new(MemoryVerificationTokenStore::new()),
            mailer: Arc::new(LogMailer::new(settings.email.base_url.clone())),
        }
    }
}

impl AppState {
    /// Create a new application state
    pub fn new(settings: Settings, backends: Backends) -> Result<Self, AppError> {
        let codec = Arc::new(JwtCodec::from_settings(&settings.jwt));
        let op_timeout = settings.kv.op_timeout();

        let sessions: Arc<dyn SessionStore> = Arc::new(KvSessionStore::new(
            backends.kv.clone(),
            settings.session.ttl(),
            op_timeout,
        ));
        let revocations: Arc<dyn RevocationStore> =
            Arc::new(KvRevocationStore::new(backends.kv, op_timeout));

        let hasher = ScryptHasher::new(settings.password.scrypt_log_n)?;
        let auth = Arc::new(DefaultAuth::new(
            AuthCollaborators {
                users: backends.users,
                sessions: sessions.clone(),
                revocations: revocations.clone(),
                tokens: backends.tokens,
                mailer: backends.mailer,
            },
            codec.clone(),
            hasher,
            PasswordRequirements::from(&settings.password),
        ));

        Ok(Self {
            auth,
            codec,
            sessions,
            revocations,
            settings: Arc::new(settings),
        })
    }
}
