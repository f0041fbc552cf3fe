// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for request fields.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::error::AppError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_NAME_LENGTH: usize = 100;
const MAX_PHONE_LENGTH: usize = 32;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
});
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()-]{4,}$").expect("phone regex is valid"));

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid phone: {0}")]
    InvalidPhone(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trimmed, lower-cased form used for every comparison and write
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "email address cannot be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "email address cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "invalid email address format".to_string(),
        ));
    }

    Ok(email)
}

/// Normalize then validate; returns the normalized address
pub fn normalized_valid_email(email: &str) -> ValidationResult<String> {
    let normalized = normalize_email(email);
    validate_email(&normalized)?;
    Ok(normalized)
}

/// Validate a display name
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "name cannot exceed {MAX_NAME_LENGTH} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::InvalidName(
            "name contains invalid characters".to_string(),
        ));
    }
    Ok(name)
}

/// Validate a phone number; empty means "no phone"
pub fn validate_phone(phone: &str) -> ValidationResult<&str> {
    if phone.is_empty() {
        return Ok(phone);
    }
    if phone.len() > MAX_PHONE_LENGTH || !PHONE_REGEX.is_match(phone) {
        return Err(ValidationError::InvalidPhone(
            "invalid phone number format".to_string(),
        ));
    }
    Ok(phone)
}
