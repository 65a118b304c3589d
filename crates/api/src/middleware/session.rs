//! Server-side session bridge over `tower-sessions`.
//!
//! The session holds only the user id; the principal is rebuilt from the live
//! record on every request.

use argon2::Argon2;
use tower_sessions::Session;
use tower_sessions::cookie::Key;

use warden_auth::AuthError;
use warden_core::UserId;

pub const SESSION_USER_KEY: &str = "user_id";

const KEY_SALT: &[u8] = b"warden.session-cookie-key";

/// Stretch the configured secret into the 64-byte cookie signing key.
pub fn session_key(secret: &str) -> Result<Key, AuthError> {
    let mut bytes = [0u8; 64];
    Argon2::default()
        .hash_password_into(secret.as_bytes(), KEY_SALT, &mut bytes)
        .map_err(|e| AuthError::internal(format!("session key derivation failed: {e}")))?;
    Ok(Key::from(&bytes))
}

/// Bind the session to `user_id`, rotating the id to prevent fixation.
pub async fn establish(session: &Session, user_id: UserId) -> Result<(), AuthError> {
    session
        .cycle_id()
        .await
        .map_err(|e| AuthError::internal(format!("session cycle failed: {e}")))?;
    session
        .insert(SESSION_USER_KEY, user_id)
        .await
        .map_err(|e| AuthError::internal(format!("session write failed: {e}")))
}

/// User id stored in the session, if any. Store errors read as "no session".
pub async fn session_user(session: &Session) -> Option<UserId> {
    match session.get::<UserId>(SESSION_USER_KEY).await {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!(error = %e, "session read failed");
            None
        }
    }
}

/// Drop all session data and expire the cookie.
pub async fn destroy(session: &Session) {
    if let Err(e) = session.flush().await {
        tracing::warn!(error = %e, "session flush failed");
    }
}
