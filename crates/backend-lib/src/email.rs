// ============================
// authgate-lib/src/email.rs
// ============================
//! Outbound mail collaborator.
use async_trait::async_trait;
use thiserror::Error;

use crate::auth::revocation::token_ref;

#[derive(Error, Debug)]
#[error("failed to send email: {0}")]
pub struct MailError(pub String);

/// Delivery of verification links. Callers treat failures as best-effort.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), MailError>;

    async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<(), MailError>;

    async fn send_email_change_verification_email(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), MailError>;
}

/// Development mailer that writes the link it would send to the log.
///
/// Only a hash prefix of the token is logged at `info`; the full link is
/// emitted at `debug` so it stays out of production logs.
#[derive(Debug, Clone)]
pub struct LogMailer {
    base_url: String,
}

impl LogMailer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn link(&self, path: &str, token: &str) -> String {
        format!("{}/{path}?token={token}", self.base_url)
    }

    fn deliver(&self, kind: &'static str, email: &str, path: &str, token: &str) {
        tracing::info!(kind, to = %mask_email(email), token_ref = %token_ref(token), "email queued");
        tracing::debug!(kind, link = %self.link(path, token), "email link");
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.deliver("verification", email, "verify-email", token);
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.deliver("password_reset", email, "reset-password", token);
        Ok(())
    }

    async fn send_email_change_verification_email(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), MailError> {
        self.deliver("email_change", email, "verify-email-change", token);
        Ok(())
    }
}

/// `john@example.com` -> `j***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        },
        None => "***".to_string(),
    }
}
