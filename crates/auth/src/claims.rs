use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::{RoleId, UserId};

use crate::Principal;

/// Discriminates access tokens from refresh tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed token payload.
///
/// Access tokens carry `username` and `role_id`; refresh tokens leave both out
/// so a leaked refresh token cannot stand in for an access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: UserId,

    #[serde(rename = "type")]
    pub kind: TokenKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, rename = "roleId", skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RoleId>,

    /// Unique token id.
    pub jti: String,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Subject recovered from a verified refresh token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RefreshSubject {
    pub sub: UserId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,
}

impl TokenClaims {
    /// Rebuild the principal an access token was issued for.
    pub fn access_principal(&self) -> Result<Principal, TokenValidationError> {
        if self.kind != TokenKind::Access {
            return Err(TokenValidationError::WrongKind {
                expected: TokenKind::Access,
            });
        }
        match (&self.username, self.role_id) {
            (Some(username), Some(role_id)) => Ok(Principal::new(self.sub, username.clone(), role_id)),
            _ => Err(TokenValidationError::Malformed),
        }
    }

    pub fn refresh_subject(&self) -> Result<RefreshSubject, TokenValidationError> {
        if self.kind != TokenKind::Refresh {
            return Err(TokenValidationError::WrongKind {
                expected: TokenKind::Refresh,
            });
        }
        Ok(RefreshSubject { sub: self.sub })
    }
}

/// Deterministically validate the time window of decoded claims.
///
/// `leeway_secs` tolerates clock skew on `iat` only; expiry is exact.
pub fn validate_claims(
    claims: &TokenClaims,
    now: i64,
    leeway_secs: i64,
) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now + leeway_secs < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(kind: TokenKind, iat: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            sub: UserId::new(7).unwrap(),
            kind,
            username: Some("client".into()),
            role_id: Some(RoleId::new(2).unwrap()),
            jti: "j".into(),
            iat,
            exp,
        }
    }

    #[test]
    fn time_window_is_checked() {
        assert_eq!(validate_claims(&claims(TokenKind::Access, 100, 200), 150, 0), Ok(()));
        assert_eq!(
            validate_claims(&claims(TokenKind::Access, 100, 200), 200, 0),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(TokenKind::Access, 100, 100), 100, 0),
            Err(TokenValidationError::InvalidTimeWindow)
        );
        assert_eq!(
            validate_claims(&claims(TokenKind::Access, 100, 200), 90, 5),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn refresh_claims_cannot_become_a_principal() {
        let c = claims(TokenKind::Refresh, 0, 10);
        assert_eq!(
            c.access_principal(),
            Err(TokenValidationError::WrongKind {
                expected: TokenKind::Access
            })
        );
    }

    #[test]
    fn wire_names_match_client_contract() {
        let json = serde_json::to_value(claims(TokenKind::Access, 1, 2)).unwrap();
        assert_eq!(json["type"], "access");
        assert_eq!(json["roleId"], 2);
        assert_eq!(json["sub"], 7);
    }
}
