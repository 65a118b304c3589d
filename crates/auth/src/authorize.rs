use std::collections::BTreeSet;

use serde::Serialize;

use warden_core::{RoleId, UserId};

use crate::{Action, AuthError, Permission, Principal, Resource, Role};

/// Outcome of a capability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Granted,
    Denied(DenialReason),
}

/// Why a capability check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialKind {
    MissingPermission { resource: Resource, action: Action },
    RoleMismatch { required: RoleId },
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }

    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Granted => Ok(()),
            Decision::Denied(reason) => Err(match reason.kind {
                DenialKind::MissingPermission { resource, action } => {
                    AuthError::PermissionDenied { resource, action }
                }
                DenialKind::RoleMismatch { required } => AuthError::RoleRequired { required },
            }),
        }
    }
}

/// Check a role's permission set for `(resource, action)`.
///
/// - No IO
/// - No panics
/// - `manage` on the resource grants every action on it
pub fn authorize(permissions: &[Permission], resource: Resource, action: Action) -> Decision {
    if permissions.iter().any(|p| p.grants(resource, action)) {
        Decision::Granted
    } else {
        Decision::Denied(DenialReason {
            kind: DenialKind::MissingPermission { resource, action },
            message: format!("missing permission '{action}' on '{resource}'"),
        })
    }
}

/// Coarse check: the principal's role id must equal `required`.
pub fn require_role(principal: &Principal, required: RoleId) -> Decision {
    if principal.role_id == required {
        Decision::Granted
    } else {
        Decision::Denied(DenialReason {
            kind: DenialKind::RoleMismatch { required },
            message: format!("role {required} required"),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this request allowed/denied?" for RBAC debugging.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The capability being checked, as `resource:action`.
    pub required_capability: String,

    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub principal: PrincipalState,

    /// Roles in the catalog that would grant the capability.
    pub granting_roles: Vec<String>,

    pub suggestions: Vec<String>,
}

/// Snapshot of the principal used for the explanation.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub username: String,
    pub role_id: RoleId,
    pub role_name: Option<String>,
    pub effective_permissions: Vec<String>,
}

/// Explain why a capability check would pass or fail.
///
/// `catalog` lists every known role with its permissions; it is only used to
/// suggest which role would grant the capability.
pub fn explain_authorization(
    principal: &Principal,
    role: Option<&Role>,
    permissions: &[Permission],
    catalog: &[(Role, Vec<Permission>)],
    resource: Resource,
    action: Action,
) -> AuthorizationExplanation {
    let required = format!("{resource}:{action}");

    let effective: BTreeSet<String> = permissions.iter().map(Permission::capability).collect();
    let exact = permissions
        .iter()
        .any(|p| p.resource == resource && p.action == action);
    let via_manage = permissions
        .iter()
        .any(|p| p.resource == resource && p.action == Action::Manage);

    let granting_roles: Vec<String> = catalog
        .iter()
        .filter(|(_, perms)| perms.iter().any(|p| p.grants(resource, action)))
        .map(|(r, _)| r.name.clone())
        .collect();

    let state = PrincipalState {
        user_id: principal.id,
        username: principal.username.clone(),
        role_id: principal.role_id,
        role_name: role.map(|r| r.name.clone()),
        effective_permissions: effective.into_iter().collect(),
    };

    if exact || via_manage {
        let reason = if exact {
            format!("role grants '{required}' directly")
        } else {
            format!("role grants '{resource}:manage', which implies '{action}'")
        };
        return AuthorizationExplanation {
            required_capability: required,
            granted: true,
            reason,
            principal: state,
            granting_roles,
            suggestions: Vec::new(),
        };
    }

    let mut suggestions = vec![
        format!("Assign '{required}' or '{resource}:manage' to the principal's role"),
    ];
    if !granting_roles.is_empty() {
        suggestions.insert(
            0,
            format!("Move the user to one of these roles: {}", granting_roles.join(", ")),
        );
    }

    AuthorizationExplanation {
        reason: format!(
            "role does not grant '{required}'. Current permissions: {:?}",
            state.effective_permissions
        ),
        required_capability: required,
        granted: false,
        principal: state,
        granting_roles,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use warden_core::PermissionId;

    use super::*;

    fn perm(id: i64, resource: Resource, action: Action) -> Permission {
        Permission {
            id: PermissionId::new(id).unwrap(),
            resource,
            action,
            description: None,
        }
    }

    fn principal(role: i64) -> Principal {
        Principal::new(
            UserId::new(1).unwrap(),
            "alice",
            RoleId::new(role).unwrap(),
        )
    }

    #[test]
    fn manage_grants_every_action_on_the_resource() {
        let perms = vec![perm(1, Resource::Project, Action::Manage)];

        for action in [Action::Read, Action::Update, Action::Delete, Action::Create] {
            assert!(authorize(&perms, Resource::Project, action).is_granted());
        }
    }

    #[test]
    fn manage_does_not_leak_across_resources() {
        let perms = vec![perm(1, Resource::Project, Action::Manage)];
        assert!(!authorize(&perms, Resource::Invoice, Action::Read).is_granted());
    }

    #[test]
    fn exact_grant_does_not_imply_other_actions() {
        let perms = vec![perm(1, Resource::Invoice, Action::Read)];
        assert!(authorize(&perms, Resource::Invoice, Action::Read).is_granted());

        let decision = authorize(&perms, Resource::Invoice, Action::Delete);
        let err = decision.into_result().unwrap_err();
        assert_eq!(
            err,
            AuthError::PermissionDenied {
                resource: Resource::Invoice,
                action: Action::Delete
            }
        );
        assert!(err.to_string().contains("delete"));
        assert!(err.to_string().contains("invoice"));
    }

    #[test]
    fn require_role_is_exact_equality() {
        assert!(require_role(&principal(2), RoleId::new(2).unwrap()).is_granted());
        assert!(!require_role(&principal(2), RoleId::new(1).unwrap()).is_granted());
    }

    #[test]
    fn explanation_names_manage_implication_and_granting_roles() {
        let admin = Role {
            id: RoleId::new(1).unwrap(),
            name: "admin".into(),
            description: None,
        };
        let client = Role {
            id: RoleId::new(2).unwrap(),
            name: "client".into(),
            description: None,
        };
        let admin_perms = vec![perm(1, Resource::Project, Action::Manage)];
        let client_perms = vec![perm(2, Resource::Project, Action::Read)];
        let catalog = vec![
            (admin.clone(), admin_perms.clone()),
            (client.clone(), client_perms.clone()),
        ];

        let granted = explain_authorization(
            &principal(1),
            Some(&admin),
            &admin_perms,
            &catalog,
            Resource::Project,
            Action::Delete,
        );
        assert!(granted.granted);
        assert!(granted.reason.contains("manage"));

        let denied = explain_authorization(
            &principal(2),
            Some(&client),
            &client_perms,
            &catalog,
            Resource::Project,
            Action::Delete,
        );
        assert!(!denied.granted);
        assert_eq!(denied.granting_roles, vec!["admin".to_string()]);
        assert!(denied.suggestions[0].contains("admin"));
    }
}
