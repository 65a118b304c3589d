use serde::{Deserialize, Serialize};

use warden_core::RoleId;

/// Name of the role new self-service and federated accounts receive.
pub const CLIENT_ROLE: &str = "client";

/// Name of the fully privileged role.
pub const ADMIN_ROLE: &str = "admin";

/// Role record used for RBAC.
///
/// Permissions are attached through the data layer's role/permission join;
/// this type only carries the role's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}
