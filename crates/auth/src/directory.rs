//! Data-layer boundary.
//!
//! The auth core never owns user, role or permission storage. It reads and
//! provisions records through [`UserDirectory`], which the infra layer
//! implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::{RoleId, UserId};

use crate::permissions::{Action, Permission, Resource};
use crate::roles::Role;

/// User record as stored by the data layer.
///
/// `secret` is never empty: it holds either the canonical `hash.salt` form or a
/// legacy plaintext value awaiting migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub role_id: RoleId,
    pub active: bool,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub secret: String,
    pub role_id: RoleId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Unique username/email constraint hit.
    #[error("{0}")]
    Conflict(String),

    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Storage collaborator for users, roles and permissions.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError>;

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    /// Case-insensitive email lookup.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Create a user. Must fail with [`DirectoryError::Conflict`] when the
    /// username or email is already taken, atomically with the insert.
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, DirectoryError>;

    async fn update_user(&self, record: UserRecord) -> Result<UserRecord, DirectoryError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError>;

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, DirectoryError>;

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DirectoryError>;

    async fn list_roles(&self) -> Result<Vec<Role>, DirectoryError>;

    async fn permissions_for_role(&self, role_id: RoleId)
    -> Result<Vec<Permission>, DirectoryError>;

    /// Whether the user's current role grants `(resource, action)`.
    async fn has_permission(
        &self,
        user_id: UserId,
        resource: Resource,
        action: Action,
    ) -> Result<bool, DirectoryError> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(false);
        };
        let permissions = self.permissions_for_role(user.role_id).await?;
        Ok(permissions.iter().any(|p| p.grants(resource, action)))
    }
}
