use thiserror::Error;

use crate::claims::TokenValidationError;
use crate::directory::DirectoryError;
use crate::permissions::{Action, Resource};

/// Authentication/authorization failure taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenValidationError),

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("user not found")]
    UserNotFound,

    #[error("user account is inactive")]
    UserInactive,

    #[error("csrf token missing or mismatched")]
    CsrfMismatch,

    #[error("permission denied: missing '{action}' on '{resource}'")]
    PermissionDenied { resource: Resource, action: Action },

    #[error("role {required} required")]
    RoleRequired { required: warden_core::RoleId },

    #[error("federated identity verification failed: {0}")]
    FederationVerificationFailed(String),

    #[error("identity provider is not available")]
    FederationUnavailable,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("directory error: {0}")]
    Directory(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn federation(msg: impl Into<String>) -> Self {
        Self::FederationVerificationFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<DirectoryError> for AuthError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Conflict(msg) => AuthError::Conflict(msg),
            DirectoryError::NotFound => AuthError::UserNotFound,
            DirectoryError::Validation(msg) => AuthError::Validation(msg),
            DirectoryError::Backend(msg) => AuthError::Directory(msg),
        }
    }
}

impl From<warden_core::DomainError> for AuthError {
    fn from(value: warden_core::DomainError) -> Self {
        AuthError::Validation(value.to_string())
    }
}
