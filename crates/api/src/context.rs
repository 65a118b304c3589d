use warden_auth::Principal;
use warden_core::{RoleId, UserId};

/// Which credential resolved the request's principal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    Bearer,
    Federation,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Session => "session",
            AuthMethod::Bearer => "bearer",
            AuthMethod::Federation => "federation",
        }
    }
}

/// Principal context for a request (authenticated identity + how it was proven).
///
/// Inserted into request extensions by the authenticator; absent on anonymous
/// requests to public paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    method: AuthMethod,
}

impl PrincipalContext {
    pub fn new(principal: Principal, method: AuthMethod) -> Self {
        Self { principal, method }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.id
    }

    pub fn role_id(&self) -> RoleId {
        self.principal.role_id
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }
}
