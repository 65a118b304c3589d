//! Login, registration, federation, token refresh and logout.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;

use warden_auth::{
    AuthError, CLIENT_ROLE, NewUser, Principal, TokenPair, UserRecord, find_or_create_federated_user,
    hash_password, verify_password_uniform,
};
use warden_core::{RoleId, UserId};

use crate::app::AppState;
use crate::app::cookies::{ACCESS_COOKIE, CSRF_COOKIE, REFRESH_COOKIE};
use crate::app::errors::ApiError;
use crate::context::PrincipalContext;
use crate::middleware::{IssuedCsrfToken, session};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 64;
const PASSWORD_MIN: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Public view of a user record (no secret).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub role_id: RoleId,
    pub role_name: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

async fn user_view(state: &AppState, record: &UserRecord) -> Result<UserView, ApiError> {
    let role = state.directory.get_role(record.role_id).await?;
    Ok(UserView {
        id: record.id,
        username: record.username.clone(),
        role_id: record.role_id,
        role_name: role.map(|r| r.name),
        email: record.email.clone(),
        display_name: record.display_name.clone(),
        avatar_url: record.avatar_url.clone(),
    })
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::internal(format!("blocking task failed: {e}")))
}

fn with_token_cookies(state: &AppState, jar: CookieJar, pair: &TokenPair) -> CookieJar {
    jar.add(state.cookies.http_only(
        ACCESS_COOKIE,
        pair.access_token.clone(),
        state.config.access_ttl,
    ))
    .add(state.cookies.http_only(
        REFRESH_COOKIE,
        pair.refresh_token.clone(),
        state.config.refresh_ttl,
    ))
}

/// Bind the session, mint tokens and build the response for a signed-in user.
async fn sign_in(
    state: &AppState,
    session: &Session,
    jar: CookieJar,
    record: &UserRecord,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let principal = Principal::from(record);
    session::establish(session, principal.id).await?;
    let pair = state.tokens.issue_pair(&principal)?;
    let jar = with_token_cookies(state, jar, &pair);

    let body = AuthResponse {
        user: user_view(state, record).await?,
        tokens: pair,
    };
    Ok((status, jar, Json(body)).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let username = req.username.trim().to_string();
    let record = state.directory.get_user_by_username(&username).await?;

    // Unknown users are checked against a decoy so both failures cost the same.
    let stored = record.as_ref().map(|r| r.secret.clone());
    let password = req.password;
    let ok = blocking(move || verify_password_uniform(&password, stored.as_deref())).await?;

    let Some(record) = record else {
        tracing::info!(username = %username, "login failed: unknown user");
        return Err(AuthError::InvalidCredentials.into());
    };
    if !ok {
        tracing::info!(user_id = %record.id, "login failed: bad password");
        return Err(AuthError::InvalidCredentials.into());
    }
    if !record.active {
        tracing::info!(user_id = %record.id, "login refused: inactive account");
        return Err(AuthError::UserInactive.into());
    }

    tracing::info!(user_id = %record.id, "login succeeded");
    sign_in(&state, &session, jar, &record, StatusCode::OK).await
}

/// POST /api/register. New accounts always get the `client` role.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let username = req.username.trim().to_string();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AuthError::Validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        ))
        .into());
    }
    if req.password.chars().count() < PASSWORD_MIN {
        return Err(AuthError::Validation(format!(
            "password must be at least {PASSWORD_MIN} characters"
        ))
        .into());
    }
    let email = req.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
    if let Some(email) = &email {
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(AuthError::Validation("email is not valid".to_string()).into());
        }
    }

    let role = state
        .directory
        .get_role_by_name(CLIENT_ROLE)
        .await?
        .ok_or_else(|| AuthError::internal("client role has not been seeded"))?;

    let password = req.password;
    let secret = blocking(move || hash_password(&password)).await??;

    let record = state
        .directory
        .create_user(NewUser {
            username,
            secret,
            role_id: role.id,
            email,
            display_name: req.display_name,
            avatar_url: None,
            external_id: None,
        })
        .await?;

    tracing::info!(user_id = %record.id, "registered new user");
    sign_in(&state, &session, jar, &record, StatusCode::CREATED).await
}

/// POST /api/federated-login
pub async fn federated_login(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Json(req): Json<FederatedLoginRequest>,
) -> Result<Response, ApiError> {
    let Some(provider) = state.federation.clone() else {
        return Err(AuthError::FederationUnavailable.into());
    };

    let identity = provider.verify(&req.id_token).await.inspect_err(|e| {
        tracing::info!(provider = provider.name(), error = %e, "federated login rejected");
    })?;
    let record = find_or_create_federated_user(state.directory.as_ref(), &identity).await?;

    tracing::info!(user_id = %record.id, provider = provider.name(), "federated login succeeded");
    sign_in(&state, &session, jar, &record, StatusCode::OK).await
}

/// POST /api/refresh-token. Token from the body, else the refresh cookie.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<Response, ApiError> {
    let supplied = body
        .and_then(|Json(b)| b.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AuthError::InvalidRefreshToken)?;

    let (pair, principal) = state
        .tokens
        .rotate(&supplied, state.directory.as_ref())
        .await
        .inspect_err(|e| tracing::info!(error = %e, "token refresh rejected"))?;

    tracing::info!(user_id = %principal.id, "token pair rotated");
    let jar = with_token_cookies(&state, jar, &pair);
    Ok((jar, Json(pair)).into_response())
}

/// POST /api/logout. Ends the session and clears every token cookie.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    principal: Option<Extension<PrincipalContext>>,
) -> Response {
    if let Some(Extension(ctx)) = &principal {
        tracing::info!(user_id = %ctx.user_id(), "logout");
    }
    session::destroy(&session).await;

    let jar = jar
        .add(state.cookies.removal(ACCESS_COOKIE))
        .add(state.cookies.removal(REFRESH_COOKIE));
    (jar, Json(json!({ "success": true }))).into_response()
}

/// GET /api/current-user. Always reads the live record.
pub async fn current_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    let record = state
        .directory
        .get_user(ctx.user_id())
        .await?
        .ok_or(AuthError::UserNotFound)?;
    let user = user_view(&state, &record).await?;
    Ok(Json(json!({ "user": user, "authMethod": ctx.method().as_str() })).into_response())
}

/// GET /api/csrf-token. For clients that cannot read the cookie.
pub async fn csrf_token(
    jar: CookieJar,
    issued: Option<Extension<IssuedCsrfToken>>,
) -> Response {
    let token = issued
        .map(|Extension(IssuedCsrfToken(token))| token)
        .or_else(|| jar.get(CSRF_COOKIE).map(|c| c.value().to_string()))
        .unwrap_or_default();
    Json(json!({ "csrfToken": token })).into_response()
}
