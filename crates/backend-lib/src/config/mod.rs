// ============================
// authgate-lib/src/config/mod.rs
// ============================
//! Configuration management.
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::CREDENTIAL_TTL;

/// Default config file looked up by [`Settings::load`]
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of environment overrides, nested keys split on `__`
/// (`AUTHGATE_JWT__SECRET`).
pub const ENV_PREFIX: &str = "AUTHGATE_";

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MIN_SECRET_BYTES: usize = 32;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub jwt: JwtSettings,
    pub session: SessionSettings,
    pub kv: KvSettings,
    pub password: PasswordSettings,
    pub email: EmailSettings,
    pub database: DatabaseSettings,
    /// Accept credentials minted without a session id
    pub allow_sessionless_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
}

/// Credential signing settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
}

/// Key-value store client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvSettings {
    /// Deadline applied to every key-value call
    pub op_timeout_ms: u64,
    /// Sweep interval of the in-memory backend
    pub reap_interval_secs: u64,
}

/// Password length policy and hashing cost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub min_length: usize,
    pub max_length: usize,
    pub scrypt_log_n: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Base of the links placed in outgoing mail
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            log_level: "info".to_string(),
            jwt: JwtSettings::default(),
            session: SessionSettings::default(),
            kv: KvSettings::default(),
            password: PasswordSettings::default(),
            email: EmailSettings::default(),
            database: DatabaseSettings::default(),
            allow_sessionless_tokens: true,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "authgate".to_string(),
            ttl_secs: 60 * 60 * 24, // 24 hours
        }
    }
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60 * 24, // 24 hours
        }
    }
}

impl Default for KvSettings {
    fn default() -> Self {
        Self {
            op_timeout_ms: 2_000,
            reap_interval_secs: 60,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            scrypt_log_n: 15,
        }
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl JwtSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl KvSettings {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Settings {
    /// Load settings from defaults, `config/default.toml` (if present) and
    /// `AUTHGATE_*` environment variables, in increasing precedence.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Same as [`Settings::load`] with an explicit config file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject settings the server cannot safely run with
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.jwt.secret.len() < MIN_SECRET_BYTES {
            bail!("jwt.secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        if self.jwt.issuer.trim().is_empty() {
            bail!("jwt.issuer must not be empty");
        }
        if self.jwt.ttl_secs != CREDENTIAL_TTL.as_secs() {
            bail!("jwt.ttl_secs is fixed at {}", CREDENTIAL_TTL.as_secs());
        }
        if self.session.ttl_secs == 0 {
            bail!("session.ttl_secs must be positive");
        }
        if self.kv.op_timeout_ms == 0 {
            bail!("kv.op_timeout_ms must be positive");
        }
        if self.kv.reap_interval_secs == 0 {
            bail!("kv.reap_interval_secs must be positive");
        }
        if self.password.min_length < 6 {
            bail!("password.min_length must be at least 6");
        }
        if self.password.max_length < self.password.min_length {
            bail!("password.max_length must not be below password.min_length");
        }
        if !(10..=20).contains(&self.password.scrypt_log_n) {
            bail!("password.scrypt_log_n must be between 10 and 20");
        }
        Ok(())
    }
}
