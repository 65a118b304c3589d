use serde::{Deserialize, Serialize};

use warden_core::{RoleId, UserId};

use crate::directory::UserRecord;

/// Identity resolved for a request.
///
/// Immutable snapshot; it is rebuilt from the live user record on every request
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub role_id: RoleId,
}

impl Principal {
    pub fn new(id: UserId, username: impl Into<String>, role_id: RoleId) -> Self {
        Self {
            id,
            username: username.into(),
            role_id,
        }
    }
}

impl From<&UserRecord> for Principal {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            role_id: record.role_id,
        }
    }
}
