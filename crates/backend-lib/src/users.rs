// ============================
// authgate-lib/src/users.rs
// ============================
//! User record collaborator.
//!
//! The orchestrator only reads and writes the fields listed on [`User`]. Every
//! email handed to a [`UserStore`] is already normalized.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use authgate_common::UserView;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

/// Role given to accounts created through sign-up
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            is_verified: user.is_verified,
        }
    }
}

/// Fields supplied when creating an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub name: String,
    pub is_verified: bool,
}

/// Profile fields written by a profile update. Email is handled separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub name: String,
    pub phone: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Verified accounts only
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn get_by_email_including_unverified(&self, email: &str) -> Result<User, StoreError>;

    /// `StoreError::Conflict` when the email is taken
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    async fn update_verification_status(&self, id: Uuid, verified: bool) -> Result<(), StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// `StoreError::Conflict` when another account owns `new_email`
    async fn update_email(&self, id: Uuid, new_email: &str) -> Result<(), StoreError>;

    async fn update_profile(&self, id: Uuid, fields: &ProfileFields) -> Result<User, StoreError>;
}

/// In-memory [`UserStore`] with a unique email index
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    async fn modify<F>(&self, id: Uuid, apply: F) -> Result<User, StoreError>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        match self.get_by_email_including_unverified(email).await {
            Ok(user) if user.is_verified => Ok(user),
            Ok(_) => Err(StoreError::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn get_by_email_including_unverified(&self, email: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_verified: new_user.is_verified,
            name: new_user.name,
            phone: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_verification_status(&self, id: Uuid, verified: bool) -> Result<(), StoreError> {
        self.modify(id, |u| u.is_verified = verified).await?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let hash = password_hash.to_string();
        self.modify(id, move |u| u.password_hash = hash).await?;
        Ok(())
    }

    async fn update_email(&self, id: Uuid, new_email: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_email && u.id != id) {
            return Err(StoreError::Conflict);
        }
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.email = new_email.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, fields: &ProfileFields) -> Result<User, StoreError> {
        let fields = fields.clone();
        self.modify(id, move |u| {
            u.name = fields.name;
            u.phone = fields.phone;
        })
        .await
    }
}
