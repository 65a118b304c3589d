//! `warden-auth`: authentication and authorization core, decoupled from HTTP.
//!
//! Everything here is either pure (password hashing, token minting, capability
//! checks) or talks to storage only through the [`UserDirectory`] trait.

pub mod authorize;
pub mod claims;
pub mod csrf;
pub mod directory;
pub mod error;
pub mod federation;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod tokens;

pub use authorize::{
    AuthorizationExplanation, Decision, DenialKind, DenialReason, PrincipalState, authorize,
    explain_authorization, require_role,
};
pub use claims::{RefreshSubject, TokenClaims, TokenKind, TokenValidationError, validate_claims};
pub use csrf::{CsrfRegistry, generate_csrf_token, tokens_match};
pub use directory::{DirectoryError, NewUser, UserDirectory, UserRecord};
pub use error::AuthError;
pub use federation::{
    DEV_IDENTITY_STUB_AVAILABLE, DevelopmentStubClient, FederatedIdentity, IdentityProviderClient,
    OidcIdTokenVerifier, ProviderCredentials, find_or_create_federated_user,
    select_identity_provider,
};
pub use password::{
    hash_password, is_legacy_secret, random_secret, verify_password, verify_password_uniform,
};
pub use permissions::{Action, Permission, Resource};
pub use principal::Principal;
pub use roles::{ADMIN_ROLE, CLIENT_ROLE, Role};
pub use tokens::{TokenIssuer, TokenPair};
