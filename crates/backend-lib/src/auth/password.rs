// ============================
// authgate-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Params, Scrypt,
};
use zeroize::Zeroize;

use crate::config::PasswordSettings;
use crate::error::AppError;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password length requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            max_length: MAX_PASSWORD_LENGTH,
        }
    }
}

impl From<&PasswordSettings> for PasswordRequirements {
    fn from(settings: &PasswordSettings) -> Self {
        Self {
            min_length: settings.min_length,
            max_length: settings.max_length,
        }
    }
}

/// Check a new password and its confirmation.
///
/// Returns the message shown to the caller on failure.
pub fn check_new_password(
    password: &str,
    confirmation: &str,
    requirements: &PasswordRequirements,
) -> Result<(), AppError> {
    let length = password.chars().count();
    if length < requirements.min_length {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            requirements.min_length
        )));
    }
    if length > requirements.max_length {
        return Err(AppError::Validation(format!(
            "password cannot exceed {} characters",
            requirements.max_length
        )));
    }
    if password != confirmation {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }
    Ok(())
}

/// Hash a password using scrypt with the given cost
pub fn hash_password(plain: &str, params: Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a PHC hash string
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Runs scrypt on the blocking pool so request tasks are not stalled.
#[derive(Debug, Clone, Copy)]
pub struct ScryptHasher {
    params: Params,
}

impl ScryptHasher {
    /// `log_n` is the scrypt CPU/memory cost exponent
    pub fn new(log_n: u8) -> Result<Self, AppError> {
        let params = Params::new(log_n, 8, 1, 32).map_err(|e| {
            tracing::error!(error = %e, log_n, "invalid scrypt parameters");
            AppError::internal("failed to configure password hashing")
        })?;
        Ok(Self { params })
    }

    pub async fn hash(&self, plain: &str) -> Result<String, AppError> {
        let mut owned = plain.to_string();
        let params = self.params;
        let result = tokio::task::spawn_blocking(move || {
            let hashed = hash_password(&owned, params);
            owned.zeroize();
            hashed
        })
        .await;

        match result {
            Ok(Ok(hash)) => Ok(hash),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "password hashing failed");
                Err(AppError::internal("failed to hash password"))
            },
            Err(e) => {
                tracing::error!(error = %e, "password hashing task failed");
                Err(AppError::internal("failed to hash password"))
            },
        }
    }

    pub async fn verify(&self, hash: &str, plain: &str) -> Result<bool, AppError> {
        let hash = hash.to_string();
        let mut owned = plain.to_string();
        tokio::task::spawn_blocking(move || {
            let ok = verify_password(&hash, &owned);
            owned.zeroize();
            ok
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password verification task failed");
            AppError::internal("failed to verify password")
        })
    }
}
