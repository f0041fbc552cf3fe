//! Postgres-backed [`VerificationTokenStore`].
//!
//! Rows live in `verification_tokens`; see `migrations/0001_verification_tokens.sql`.
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};
use tracing::Instrument;
use uuid::Uuid;

use super::verification::{TokenType, VerificationToken, VerificationTokenStore};
use crate::error::StoreError;

/// Schema applied by [`PgVerificationTokenStore::migrate`]
pub const MIGRATION: &str = include_str!("../../migrations/0001_verification_tokens.sql");

#[derive(Clone)]
pub struct PgVerificationTokenStore {
    pool: PgPool,
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn backend(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "verification token query failed");
    StoreError::Backend(err.to_string())
}

fn token_from_row(row: &PgRow) -> Result<VerificationToken, StoreError> {
    let token_type: String = row.get("token_type");
    Ok(VerificationToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        token_type: token_type.parse::<TokenType>()?,
        new_email: row.get("new_email"),
        expires_at: row.get("expires_at"),
    })
}

impl PgVerificationTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against `url`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(backend)?;
        Ok(Self::new(pool))
    }

    /// Create the table and indexes when missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl VerificationTokenStore for PgVerificationTokenStore {
    async fn create(&self, token: &VerificationToken) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO verification_tokens
                (id, user_id, token, token_type, new_email, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(token.id)
            .bind(token.user_id)
            .bind(&token.token)
            .bind(token.token_type.as_str())
            .bind(token.new_email.as_deref())
            .bind(token.expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
                other => backend(other),
            })?;
        Ok(())
    }

    async fn find_valid(&self, token: &str) -> Result<VerificationToken, StoreError> {
        let query = r"
            SELECT id, user_id, token, token_type, new_email, expires_at
            FROM verification_tokens
            WHERE token = $1 AND expires_at > NOW()
        ";
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?;

        token_from_row(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM verification_tokens WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn take(&self, token: &str, token_type: TokenType) -> Result<VerificationToken, StoreError> {
        let query = r"
            DELETE FROM verification_tokens
            WHERE token = $1 AND token_type = $2 AND expires_at > NOW()
            RETURNING id, user_id, token, token_type, new_email, expires_at
        ";
        let row = sqlx::query(query)
            .bind(token)
            .bind(token_type.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?;
        token_from_row(&row)
    }

    async fn delete_for_user(&self, user_id: Uuid, token_type: TokenType) -> Result<u64, StoreError> {
        let query = "DELETE FROM verification_tokens WHERE user_id = $1 AND token_type = $2";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_type.as_str())
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}
