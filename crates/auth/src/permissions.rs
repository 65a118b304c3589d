use core::str::FromStr;

use serde::{Deserialize, Serialize};

use warden_core::{DomainError, PermissionId};

/// Resource a permission applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Project,
    Invoice,
    Document,
    BlogPost,
    Message,
    User,
    Role,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Project,
        Resource::Invoice,
        Resource::Document,
        Resource::BlogPost,
        Resource::Message,
        Resource::User,
        Resource::Role,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Project => "project",
            Resource::Invoice => "invoice",
            Resource::Document => "document",
            Resource::BlogPost => "blog_post",
            Resource::Message => "message",
            Resource::User => "user",
            Resource::Role => "role",
        }
    }
}

impl FromStr for Resource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| DomainError::validation(format!("unknown resource '{s}'")))
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action on a resource. `Manage` implies every other action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }

    /// Whether holding `self` grants `requested`.
    pub fn covers(&self, requested: Action) -> bool {
        *self == Action::Manage || *self == requested
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| DomainError::validation(format!("unknown action '{s}'")))
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(resource, action)` grant as stored by the data layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub resource: Resource,
    pub action: Action,
    pub description: Option<String>,
}

impl Permission {
    pub fn grants(&self, resource: Resource, action: Action) -> bool {
        self.resource == resource && self.action.covers(action)
    }

    /// Capability name in `resource:action` form (display/audit only).
    pub fn capability(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}
