//! Access/refresh token minting and verification (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claims::{RefreshSubject, TokenClaims, TokenKind, TokenValidationError, validate_claims};
use crate::{AuthError, Principal, UserDirectory};

/// Freshly minted access + refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Clock skew tolerated on `iat`.
const IAT_LEEWAY_SECS: i64 = 30;

/// Mints and verifies signed tokens. Stateless: nothing about issued tokens
/// is remembered, so verification is safe to call from any number of requests.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
    pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

    /// Build an issuer. Pass the same bytes twice to share one secret.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl: Duration::minutes(Self::DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::days(Self::DEFAULT_REFRESH_TTL_DAYS),
        }
    }

    pub fn with_lifetimes(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_access_token_at(principal, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: principal.id,
            kind: TokenKind::Access,
            username: Some(principal.username.clone()),
            role_id: Some(principal.role_id),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&claims, &self.access_encoding)
    }

    pub fn issue_refresh_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_refresh_token_at(principal, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: principal.id,
            kind: TokenKind::Refresh,
            username: None,
            role_id: None,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        encode(&claims, &self.refresh_encoding)
    }

    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_access_token_at(principal, now)?,
            refresh_token: self.issue_refresh_token_at(principal, now)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature, expiry and `type == "access"`.
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = decode(token, &self.access_decoding, true)?;
        if claims.kind != TokenKind::Access {
            return Err(TokenValidationError::WrongKind {
                expected: TokenKind::Access,
            }
            .into());
        }
        Ok(claims)
    }

    /// Verify a refresh token. Every failure collapses to `InvalidRefreshToken`.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshSubject, AuthError> {
        decode(token, &self.refresh_decoding, true)
            .ok()
            .and_then(|claims| claims.refresh_subject().ok())
            .ok_or(AuthError::InvalidRefreshToken)
    }

    /// Whether a correctly signed access token expires within `threshold`.
    ///
    /// Tokens that fail signature checks are never "near expiry".
    pub fn is_near_expiry(&self, token: &str, threshold: Duration) -> bool {
        self.is_near_expiry_at(token, threshold, Utc::now())
    }

    pub fn is_near_expiry_at(&self, token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
        match decode(token, &self.access_decoding, false) {
            Ok(claims) => claims.exp - now.timestamp() <= threshold.num_seconds(),
            Err(_) => false,
        }
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The live user record is consulted so that deactivation and role changes
    /// since the refresh token was issued take effect immediately.
    pub async fn rotate(
        &self,
        refresh_token: &str,
        directory: &dyn UserDirectory,
    ) -> Result<(TokenPair, Principal), AuthError> {
        let subject = self.verify_refresh(refresh_token)?;

        let user = directory
            .get_user(subject.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if !user.active {
            return Err(AuthError::UserInactive);
        }

        let principal = Principal::from(&user);
        let pair = self.issue_pair(&principal)?;
        tracing::debug!(user_id = %principal.id, "rotated token pair");
        Ok((pair, principal))
    }
}

fn encode(claims: &TokenClaims, key: &EncodingKey) -> Result<String, AuthError> {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))
}

fn decode(token: &str, key: &DecodingKey, check_exp: bool) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = check_exp;
    if !check_exp {
        validation.required_spec_claims.clear();
    }

    let claims = jsonwebtoken::decode::<TokenClaims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenValidationError::Expired,
            ErrorKind::InvalidSignature => TokenValidationError::BadSignature,
            _ => TokenValidationError::Malformed,
        })?;

    if check_exp {
        validate_claims(&claims, Utc::now().timestamp(), IAT_LEEWAY_SECS)?;
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use warden_core::{RoleId, UserId};

    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"access-secret", b"refresh-secret")
    }

    fn principal() -> Principal {
        Principal::new(UserId::new(3).unwrap(), "client", RoleId::new(2).unwrap())
    }

    #[test]
    fn pair_round_trips_principal_and_subject_only() {
        let issuer = issuer();
        let pair = issuer.issue_pair(&principal()).unwrap();

        let access = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.access_principal().unwrap(), principal());

        let subject = issuer.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(subject.sub, principal().id);

        // The refresh payload carries nothing beyond the subject.
        let raw = decode(
            &pair.refresh_token,
            &DecodingKey::from_secret(b"refresh-secret"),
            true,
        )
        .unwrap();
        assert_eq!(raw.kind, TokenKind::Refresh);
        assert!(raw.username.is_none());
        assert!(raw.role_id.is_none());
    }

    #[test]
    fn refresh_token_is_not_an_access_credential() {
        let shared = TokenIssuer::new(b"same", b"same");
        let pair = shared.issue_pair(&principal()).unwrap();

        let err = shared.verify_access(&pair.refresh_token).unwrap_err();
        assert_eq!(
            err,
            AuthError::InvalidToken(TokenValidationError::WrongKind {
                expected: TokenKind::Access
            })
        );
        assert_eq!(
            shared.verify_refresh(&pair.access_token),
            Err(AuthError::InvalidRefreshToken)
        );
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let expired = issuer().with_lifetimes(Duration::seconds(-60), Duration::days(7));
        let token = expired.issue_access_token(&principal()).unwrap();
        assert_eq!(
            issuer().verify_access(&token),
            Err(AuthError::InvalidToken(TokenValidationError::Expired))
        );

        let foreign = TokenIssuer::new(b"other", b"other")
            .issue_access_token(&principal())
            .unwrap();
        assert_eq!(
            issuer().verify_access(&foreign),
            Err(AuthError::InvalidToken(TokenValidationError::BadSignature))
        );

        assert_eq!(
            issuer().verify_access("not.a.jwt"),
            Err(AuthError::InvalidToken(TokenValidationError::Malformed))
        );
    }

    #[test]
    fn near_expiry_threshold() {
        let issuer = issuer();
        let now = Utc::now();
        let token = issuer.issue_access_token_at(&principal(), now).unwrap();

        assert!(!issuer.is_near_expiry_at(&token, Duration::minutes(5), now));
        assert!(issuer.is_near_expiry_at(&token, Duration::minutes(5), now + Duration::minutes(11)));
        assert!(!issuer.is_near_expiry_at("garbage", Duration::minutes(5), now));
    }

    #[test]
    fn tokens_minted_back_to_back_differ() {
        let issuer = issuer();
        let a = issuer.issue_access_token(&principal()).unwrap();
        let b = issuer.issue_access_token(&principal()).unwrap();
        assert_ne!(a, b);
    }
}
