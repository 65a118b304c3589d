use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use warden_auth::{
    Action, DirectoryError, NewUser, Permission, Resource, Role, UserDirectory, UserRecord,
};
use warden_core::{PermissionId, RoleId, UserId};

/// In-memory user/role/permission directory.
///
/// Intended for tests/dev. Uniqueness of usernames and emails is enforced under
/// a single write lock, so concurrent `create_user` calls for the same email
/// yield exactly one record and `Conflict` for the rest.
#[derive(Debug)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    permissions: RwLock<HashMap<PermissionId, Permission>>,
    grants: RwLock<HashMap<RoleId, BTreeSet<PermissionId>>>,
    next_user: AtomicI64,
    next_role: AtomicI64,
    next_permission: AtomicI64,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Backend("lock poisoned".to_string())
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            roles: RwLock::new(HashMap::new()),
            permissions: RwLock::new(HashMap::new()),
            grants: RwLock::new(HashMap::new()),
            next_user: AtomicI64::new(1),
            next_role: AtomicI64::new(1),
            next_permission: AtomicI64::new(1),
        }
    }

    /// Create a role, or return the existing one with the same name.
    pub fn insert_role(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role, DirectoryError> {
        let mut roles = self.roles.write().map_err(|_| poisoned())?;
        if let Some(existing) = roles.values().find(|r| r.name == name) {
            return Ok(existing.clone());
        }

        let id = RoleId::new(self.next_role.fetch_add(1, Ordering::SeqCst))
            .map_err(|e| DirectoryError::Backend(e.to_string()))?;
        let role = Role {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        roles.insert(id, role.clone());
        Ok(role)
    }

    /// Create a permission, or return the existing `(resource, action)` entry.
    pub fn insert_permission(
        &self,
        resource: Resource,
        action: Action,
        description: Option<&str>,
    ) -> Result<Permission, DirectoryError> {
        let mut permissions = self.permissions.write().map_err(|_| poisoned())?;
        if let Some(existing) = permissions
            .values()
            .find(|p| p.resource == resource && p.action == action)
        {
            return Ok(existing.clone());
        }

        let id = PermissionId::new(self.next_permission.fetch_add(1, Ordering::SeqCst))
            .map_err(|e| DirectoryError::Backend(e.to_string()))?;
        let permission = Permission {
            id,
            resource,
            action,
            description: description.map(str::to_string),
        };
        permissions.insert(id, permission.clone());
        Ok(permission)
    }

    /// Attach a permission to a role. Idempotent.
    pub fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<(), DirectoryError> {
        if !self.roles.read().map_err(|_| poisoned())?.contains_key(&role_id) {
            return Err(DirectoryError::NotFound);
        }
        if !self
            .permissions
            .read()
            .map_err(|_| poisoned())?
            .contains_key(&permission_id)
        {
            return Err(DirectoryError::NotFound);
        }

        self.grants
            .write()
            .map_err(|_| poisoned())?
            .entry(role_id)
            .or_default()
            .insert(permission_id);
        Ok(())
    }

    /// Detach a permission from a role. Returns whether it was attached.
    pub fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<bool, DirectoryError> {
        let mut grants = self.grants.write().map_err(|_| poisoned())?;
        Ok(grants
            .get_mut(&role_id)
            .map(|set| set.remove(&permission_id))
            .unwrap_or(false))
    }

    pub fn set_active(&self, user_id: UserId, active: bool) -> Result<(), DirectoryError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&user_id).ok_or(DirectoryError::NotFound)?;
        user.active = active;
        user.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), DirectoryError> {
        if !self.roles.read().map_err(|_| poisoned())?.contains_key(&role_id) {
            return Err(DirectoryError::NotFound);
        }
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&user_id).ok_or(DirectoryError::NotFound)?;
        user.role_id = role_id;
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Remove a user outright (used to model deleted accounts).
    pub fn remove_user(&self, user_id: UserId) -> Result<bool, DirectoryError> {
        Ok(self
            .users
            .write()
            .map_err(|_| poisoned())?
            .remove(&user_id)
            .is_some())
    }

    fn check_unique(
        users: &HashMap<UserId, UserRecord>,
        skip: Option<UserId>,
        username: &str,
        email: Option<&str>,
    ) -> Result<(), DirectoryError> {
        for other in users.values().filter(|u| Some(u.id) != skip) {
            if other.username == username {
                return Err(DirectoryError::Conflict(format!(
                    "username '{username}' is already taken"
                )));
            }
            if let (Some(email), Some(existing)) = (email, other.email.as_deref()) {
                if existing.eq_ignore_ascii_case(email) {
                    return Err(DirectoryError::Conflict(format!(
                        "email '{email}' is already registered"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let email = email.trim();
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, DirectoryError> {
        let username = new_user.username.trim().to_string();
        if username.is_empty() {
            return Err(DirectoryError::Validation("username is required".to_string()));
        }
        if new_user.secret.is_empty() {
            return Err(DirectoryError::Validation("secret is required".to_string()));
        }
        if !self
            .roles
            .read()
            .map_err(|_| poisoned())?
            .contains_key(&new_user.role_id)
        {
            return Err(DirectoryError::Validation(format!(
                "unknown role {}",
                new_user.role_id
            )));
        }
        let email = normalize_email(new_user.email);

        let mut users = self.users.write().map_err(|_| poisoned())?;
        Self::check_unique(&users, None, &username, email.as_deref())?;

        let id = UserId::new(self.next_user.fetch_add(1, Ordering::SeqCst))
            .map_err(|e| DirectoryError::Backend(e.to_string()))?;
        let now = Utc::now();
        let record = UserRecord {
            id,
            username,
            secret: new_user.secret,
            role_id: new_user.role_id,
            active: true,
            email,
            display_name: new_user.display_name,
            avatar_url: new_user.avatar_url,
            external_id: new_user.external_id,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, mut record: UserRecord) -> Result<UserRecord, DirectoryError> {
        if record.secret.is_empty() {
            return Err(DirectoryError::Validation("secret is required".to_string()));
        }
        record.email = normalize_email(record.email);

        let mut users = self.users.write().map_err(|_| poisoned())?;
        let existing = users.get(&record.id).ok_or(DirectoryError::NotFound)?;
        record.created_at = existing.created_at;
        Self::check_unique(&users, Some(record.id), &record.username, record.email.as_deref())?;

        record.updated_at = Utc::now();
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let mut out: Vec<UserRecord> = users.values().cloned().collect();
        out.sort_by_key(|u| u.id);
        Ok(out)
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, DirectoryError> {
        Ok(self.roles.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DirectoryError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        Ok(roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, DirectoryError> {
        let roles = self.roles.read().map_err(|_| poisoned())?;
        let mut out: Vec<Role> = roles.values().cloned().collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    async fn permissions_for_role(
        &self,
        role_id: RoleId,
    ) -> Result<Vec<Permission>, DirectoryError> {
        let grants = self.grants.read().map_err(|_| poisoned())?;
        let Some(ids) = grants.get(&role_id) else {
            return Ok(Vec::new());
        };
        let permissions = self.permissions.read().map_err(|_| poisoned())?;
        Ok(ids
            .iter()
            .filter_map(|id| permissions.get(id).cloned())
            .collect())
    }
}
