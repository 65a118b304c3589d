//! Identity federation: external identity-provider tokens → local users.
//!
//! The provider client is chosen once at startup by [`select_identity_provider`];
//! request handling never branches on the environment.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use warden_core::DeploymentMode;

use crate::directory::{DirectoryError, NewUser, UserDirectory, UserRecord};
use crate::password::random_secret;
use crate::roles::CLIENT_ROLE;
use crate::AuthError;

/// Identity asserted by the external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedIdentity {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Set only by the development stub.
    #[serde(default)]
    pub synthetic: bool,
}

/// Verifies identity-provider tokens.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError>;
}

/// Credentials for the real provider. All three are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub issuer: String,
    pub audience: String,
    pub public_key_pem: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Real provider: OIDC ID tokens signed with the provider's RSA key
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifies OIDC ID tokens (issuer, audience, expiry and signature).
pub struct OidcIdTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl OidcIdTokenVerifier {
    const LEEWAY_SECS: u64 = 30;

    pub fn from_rsa_pem(credentials: &ProviderCredentials) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(credentials.public_key_pem.as_bytes())
            .map_err(|e| AuthError::internal(format!("invalid identity provider key: {e}")))?;
        Ok(Self::with_key(
            key,
            Algorithm::RS256,
            &credentials.issuer,
            &credentials.audience,
        ))
    }

    /// HMAC-signed variant, for providers that share a secret (and for tests).
    pub fn from_shared_secret(secret: &[u8], issuer: &str, audience: &str) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256, issuer, audience)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.leeway = Self::LEEWAY_SECS;
        Self { key, validation }
    }
}

#[async_trait]
impl IdentityProviderClient for OidcIdTokenVerifier {
    fn name(&self) -> &'static str {
        "oidc"
    }

    async fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError> {
        let claims = jsonwebtoken::decode::<IdTokenClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                AuthError::federation(match e.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    ErrorKind::InvalidIssuer => "unexpected issuer",
                    ErrorKind::InvalidAudience => "unexpected audience",
                    _ => "malformed token",
                })
            })?;

        if claims.email_verified == Some(false) {
            return Err(AuthError::federation("email not verified"));
        }
        let email = claims
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::federation("token carries no email"))?;

        Ok(FederatedIdentity {
            external_id: claims.sub,
            email,
            display_name: claims.name,
            avatar_url: claims.picture,
            synthetic: false,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Development stub
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts any non-empty token and returns a fixed, clearly synthetic identity.
///
/// Only reachable through [`select_identity_provider`] in development mode with
/// the `dev-identity-stub` feature compiled in.
#[derive(Debug, Default)]
pub struct DevelopmentStubClient;

impl DevelopmentStubClient {
    pub const EMAIL: &'static str = "federated-dev@localhost.invalid";
}

#[async_trait]
impl IdentityProviderClient for DevelopmentStubClient {
    fn name(&self) -> &'static str {
        "development-stub"
    }

    async fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::federation("empty token"));
        }
        Ok(FederatedIdentity {
            external_id: "dev-stub".to_string(),
            email: Self::EMAIL.to_string(),
            display_name: Some("Development User (synthetic)".to_string()),
            avatar_url: None,
            synthetic: true,
        })
    }
}

/// True when this build may fall back to [`DevelopmentStubClient`]: the
/// `dev-identity-stub` feature is on and debug assertions are enabled.
/// Release builds never carry the stub.
pub const DEV_IDENTITY_STUB_AVAILABLE: bool =
    cfg!(all(feature = "dev-identity-stub", debug_assertions));

/// Pick the provider client once, at process start.
///
/// - credentials present → real verifier (a bad key is a startup error)
/// - no credentials, development, stub compiled in → development stub
/// - otherwise → `None`: every federated credential is refused
pub fn select_identity_provider(
    credentials: Option<&ProviderCredentials>,
    mode: DeploymentMode,
) -> Result<Option<Arc<dyn IdentityProviderClient>>, AuthError> {
    choose_identity_provider(credentials, mode, DEV_IDENTITY_STUB_AVAILABLE)
}

fn choose_identity_provider(
    credentials: Option<&ProviderCredentials>,
    mode: DeploymentMode,
    stub_available: bool,
) -> Result<Option<Arc<dyn IdentityProviderClient>>, AuthError> {
    if let Some(credentials) = credentials {
        let verifier = OidcIdTokenVerifier::from_rsa_pem(credentials)?;
        tracing::info!(issuer = %credentials.issuer, "identity provider configured");
        return Ok(Some(Arc::new(verifier)));
    }

    if mode.is_production() {
        tracing::error!("no identity provider credentials in production; federated login disabled");
        return Ok(None);
    }

    if stub_available {
        tracing::warn!(
            "USING DEVELOPMENT IDENTITY STUB: any federation token maps to {}",
            DevelopmentStubClient::EMAIL
        );
        return Ok(Some(Arc::new(DevelopmentStubClient)));
    }

    tracing::warn!("no identity provider credentials; federated login disabled");
    Ok(None)
}

// ─────────────────────────────────────────────────────────────────────────────
// Find-or-create
// ─────────────────────────────────────────────────────────────────────────────

const MAX_PROVISION_ATTEMPTS: usize = 3;

/// Resolve the local user for a federated identity, creating one on first sight.
///
/// Email is the join key. A concurrent first login for the same email loses the
/// directory's uniqueness check and re-reads the winner's record.
pub async fn find_or_create_federated_user(
    directory: &dyn UserDirectory,
    identity: &FederatedIdentity,
) -> Result<UserRecord, AuthError> {
    let email = identity.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::federation("identity has no email"));
    }

    if let Some(existing) = directory.get_user_by_email(&email).await? {
        return ensure_active(existing);
    }

    let role = directory
        .get_role_by_name(CLIENT_ROLE)
        .await?
        .ok_or_else(|| AuthError::internal(format!("default role '{CLIENT_ROLE}' is missing")))?;

    // One hash for every attempt, computed off the async workers.
    let secret = tokio::task::spawn_blocking(random_secret)
        .await
        .map_err(|e| AuthError::internal(format!("secret generation task failed: {e}")))??;

    let base = username_base(&email);
    for attempt in 0..MAX_PROVISION_ATTEMPTS {
        let username = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}-{}", &crate::csrf::generate_csrf_token()[..6])
        };

        let new_user = NewUser {
            username,
            secret: secret.clone(),
            role_id: role.id,
            email: Some(email.clone()),
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            external_id: Some(identity.external_id.clone()),
        };

        match directory.create_user(new_user).await {
            Ok(created) => {
                tracing::info!(user_id = %created.id, synthetic = identity.synthetic, "provisioned federated user");
                return Ok(created);
            }
            Err(DirectoryError::Conflict(_)) => {
                if let Some(winner) = directory.get_user_by_email(&email).await? {
                    return ensure_active(winner);
                }
                // Username collision with an unrelated account; retry with a suffix.
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AuthError::Conflict(format!(
        "could not allocate a username for {email}"
    )))
}

fn ensure_active(record: UserRecord) -> Result<UserRecord, AuthError> {
    if record.active {
        Ok(record)
    } else {
        Err(AuthError::UserInactive)
    }
}

fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if cleaned.len() < 3 {
        format!("user-{cleaned}")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    use super::*;

    fn id_token(secret: &[u8], claims: serde_json::Value) -> String {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    fn verifier() -> OidcIdTokenVerifier {
        OidcIdTokenVerifier::from_shared_secret(b"idp", "https://idp.test", "warden")
    }

    #[tokio::test]
    async fn verifies_issuer_audience_and_maps_profile() {
        let token = id_token(
            b"idp",
            json!({
                "sub": "ext-1", "email": "Ada@Example.com", "name": "Ada",
                "picture": "https://img/ada.png",
                "iss": "https://idp.test", "aud": "warden",
                "exp": Utc::now().timestamp() + 300,
            }),
        );

        let identity = verifier().verify(&token).await.unwrap();
        assert_eq!(identity.external_id, "ext-1");
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
        assert!(!identity.synthetic);
    }

    #[tokio::test]
    async fn rejects_wrong_audience_and_expired_tokens() {
        let wrong_aud = id_token(
            b"idp",
            json!({"sub": "x", "email": "a@b.c", "iss": "https://idp.test", "aud": "other",
                   "exp": Utc::now().timestamp() + 300}),
        );
        assert!(matches!(
            verifier().verify(&wrong_aud).await,
            Err(AuthError::FederationVerificationFailed(_))
        ));

        let expired = id_token(
            b"idp",
            json!({"sub": "x", "email": "a@b.c", "iss": "https://idp.test", "aud": "warden",
                   "exp": Utc::now().timestamp() - 600}),
        );
        assert_eq!(
            verifier().verify(&expired).await,
            Err(AuthError::federation("token expired"))
        );
    }

    #[test]
    fn production_without_credentials_is_closed() {
        let selected = select_identity_provider(None, DeploymentMode::Production).unwrap();
        assert!(selected.is_none());
    }

    #[test]
    fn stub_needs_both_the_build_and_development_mode() {
        let dev = choose_identity_provider(None, DeploymentMode::Development, true).unwrap();
        assert_eq!(dev.map(|p| p.name()), Some("development-stub"));

        assert!(choose_identity_provider(None, DeploymentMode::Production, true).unwrap().is_none());
        assert!(choose_identity_provider(None, DeploymentMode::Development, false).unwrap().is_none());
    }

    #[test]
    fn release_builds_never_carry_the_stub() {
        if !cfg!(debug_assertions) {
            assert!(!DEV_IDENTITY_STUB_AVAILABLE);
        }
        if !cfg!(feature = "dev-identity-stub") {
            assert!(!DEV_IDENTITY_STUB_AVAILABLE);
        }
    }

    #[test]
    fn bad_key_is_a_startup_error() {
        let creds = ProviderCredentials {
            issuer: "i".into(),
            audience: "a".into(),
            public_key_pem: "not a pem".into(),
        };
        assert!(select_identity_provider(Some(&creds), DeploymentMode::Development).is_err());
    }

    #[test]
    fn username_base_is_sanitized() {
        assert_eq!(username_base("ada.l+test@example.com"), "ada.ltest");
        assert_eq!(username_base("x@example.com"), "user-x");
    }
}
