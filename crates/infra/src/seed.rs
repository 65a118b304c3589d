//! Default RBAC catalog and bootstrap accounts.

use warden_auth::{
    ADMIN_ROLE, Action, AuthError, CLIENT_ROLE, NewUser, Resource, UserDirectory, UserRecord,
    hash_password,
};

use crate::InMemoryDirectory;

/// What [`seed_default_rbac`] put in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub roles: usize,
    pub permissions: usize,
    pub grants: usize,
}

/// Capabilities the `client` role starts with.
const CLIENT_GRANTS: &[(Resource, Action)] = &[
    (Resource::Project, Action::Read),
    (Resource::Invoice, Action::Read),
    (Resource::Document, Action::Read),
    (Resource::BlogPost, Action::Read),
    (Resource::Message, Action::Create),
    (Resource::Message, Action::Read),
];

/// Seed the `admin` and `client` roles plus the full permission catalog.
///
/// `admin` gets `manage` on every resource. Idempotent.
pub fn seed_default_rbac(directory: &InMemoryDirectory) -> Result<SeedReport, AuthError> {
    let admin = directory.insert_role(ADMIN_ROLE, Some("Full access to every resource"))?;
    let client = directory.insert_role(CLIENT_ROLE, Some("Self-service client account"))?;

    let mut permissions = 0;
    let mut grants = 0;
    for resource in Resource::ALL {
        for action in Action::ALL {
            let permission = directory.insert_permission(
                resource,
                action,
                Some(&format!("{action} {resource}")),
            )?;
            permissions += 1;

            if action == Action::Manage {
                directory.grant(admin.id, permission.id)?;
                grants += 1;
            }
            if CLIENT_GRANTS.contains(&(resource, action)) {
                directory.grant(client.id, permission.id)?;
                grants += 1;
            }
        }
    }

    tracing::info!(roles = 2, permissions, grants, "seeded default rbac catalog");
    Ok(SeedReport {
        roles: 2,
        permissions,
        grants,
    })
}

/// Ensure an `admin` account with the given credentials exists.
///
/// An existing account with the username is left untouched.
pub async fn bootstrap_admin(
    directory: &dyn UserDirectory,
    username: &str,
    password: &str,
) -> Result<UserRecord, AuthError> {
    if let Some(existing) = directory.get_user_by_username(username).await? {
        return Ok(existing);
    }

    let role = directory
        .get_role_by_name(ADMIN_ROLE)
        .await?
        .ok_or_else(|| AuthError::internal("admin role has not been seeded"))?;

    let created = directory
        .create_user(NewUser {
            username: username.to_string(),
            secret: hash_password(password)?,
            role_id: role.id,
            email: None,
            display_name: Some("Administrator".to_string()),
            avatar_url: None,
            external_id: None,
        })
        .await?;
    tracing::info!(user_id = %created.id, "bootstrapped admin account");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use warden_auth::verify_password;

    use super::*;

    #[tokio::test]
    async fn admin_manages_everything_and_client_is_scoped() {
        let dir = InMemoryDirectory::new();
        let report = seed_default_rbac(&dir).unwrap();
        assert_eq!(report.permissions, Resource::ALL.len() * Action::ALL.len());

        let admin = dir.get_role_by_name(ADMIN_ROLE).await.unwrap().unwrap();
        let client = dir.get_role_by_name(CLIENT_ROLE).await.unwrap().unwrap();

        let admin_perms = dir.permissions_for_role(admin.id).await.unwrap();
        for resource in Resource::ALL {
            for action in Action::ALL {
                assert!(admin_perms.iter().any(|p| p.grants(resource, action)));
            }
        }

        let client_perms = dir.permissions_for_role(client.id).await.unwrap();
        assert!(client_perms.iter().any(|p| p.grants(Resource::Project, Action::Read)));
        assert!(!client_perms.iter().any(|p| p.grants(Resource::Project, Action::Update)));
        assert!(!client_perms.iter().any(|p| p.grants(Resource::Role, Action::Manage)));
    }

    #[tokio::test]
    async fn seeding_twice_is_stable() {
        let dir = InMemoryDirectory::new();
        seed_default_rbac(&dir).unwrap();
        seed_default_rbac(&dir).unwrap();
        assert_eq!(dir.list_roles().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bootstrap_admin_hashes_and_is_idempotent() {
        let dir = InMemoryDirectory::new();
        seed_default_rbac(&dir).unwrap();

        let first = bootstrap_admin(&dir, "root", "hunter22").await.unwrap();
        assert!(verify_password("hunter22", Some(&first.secret)));
        assert_ne!(first.secret, "hunter22");

        let again = bootstrap_admin(&dir, "root", "other").await.unwrap();
        assert_eq!(again.id, first.id);
    }
}
