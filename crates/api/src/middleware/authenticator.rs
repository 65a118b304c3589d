//! Request authentication.
//!
//! An [`Authenticator`] holds an ordered list of [`AuthStrategy`] values and
//! returns the first one that resolves a principal. Strategies never fail the
//! request themselves; the middleware decides between anonymous pass-through
//! and `401` once every strategy has declined.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, Uri, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tower_sessions::Session;

use warden_auth::{Principal, UserRecord, find_or_create_federated_user};

use crate::app::AppState;
use crate::app::cookies::{ACCESS_COOKIE, ACCESS_HEADER, IDENTITY_HEADER, append_cookie};
use crate::app::errors::unauthorized;
use crate::context::{AuthMethod, PrincipalContext};
use crate::middleware::session;

/// Request data visible to strategies.
pub struct AuthAttempt<'a> {
    pub headers: &'a HeaderMap,
    pub uri: &'a Uri,
    pub session: Option<&'a Session>,
}

/// Principal resolved by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub principal: Principal,
    pub method: AuthMethod,
    /// Replacement access token when the presented one was close to expiry.
    pub rotated_access_token: Option<String>,
}

impl Resolved {
    fn new(record: &UserRecord, method: AuthMethod) -> Self {
        Self {
            principal: Principal::from(record),
            method,
            rotated_access_token: None,
        }
    }
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` means "not mine / not valid"; the next strategy gets a turn.
    async fn resolve(&self, attempt: &AuthAttempt<'_>, state: &AppState) -> Option<Resolved>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Server-side session cookie.
pub struct SessionStrategy;

#[async_trait]
impl AuthStrategy for SessionStrategy {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn resolve(&self, attempt: &AuthAttempt<'_>, state: &AppState) -> Option<Resolved> {
        let session = attempt.session?;
        let user_id = session::session_user(session).await?;

        match state.directory.get_user(user_id).await {
            Ok(Some(record)) if record.active => Some(Resolved::new(&record, AuthMethod::Session)),
            Ok(_) => {
                tracing::info!(user_id = %user_id, "session user missing or inactive; destroying session");
                session::destroy(session).await;
                None
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "session user lookup failed");
                None
            }
        }
    }
}

/// Bearer access token: `Authorization` header, then the access cookie, then
/// the `access_token` query parameter.
pub struct BearerStrategy;

impl BearerStrategy {
    fn token(attempt: &AuthAttempt<'_>) -> Option<String> {
        if let Some(token) = attempt
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return Some(token.to_string());
        }

        if let Some(cookie) = CookieJar::from_headers(attempt.headers).get(ACCESS_COOKIE) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }

        Query::<HashMap<String, String>>::try_from_uri(attempt.uri)
            .ok()
            .and_then(|Query(mut params)| params.remove("access_token"))
            .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl AuthStrategy for BearerStrategy {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn resolve(&self, attempt: &AuthAttempt<'_>, state: &AppState) -> Option<Resolved> {
        let token = Self::token(attempt)?;

        let claims = match state.tokens.verify_access(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                return None;
            }
        };

        // The live record decides; a stale role claim in the token is ignored.
        let record = match state.directory.get_user(claims.sub).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(user_id = %claims.sub, error = %e, "bearer user lookup failed");
                return None;
            }
        };
        if !record.active || claims.username.as_deref() != Some(record.username.as_str()) {
            tracing::info!(user_id = %record.id, "bearer token does not match live user record");
            return None;
        }

        let mut resolved = Resolved::new(&record, AuthMethod::Bearer);
        if state.tokens.is_near_expiry(&token, state.config.refresh_threshold) {
            match state.tokens.issue_access_token(&resolved.principal) {
                Ok(fresh) => resolved.rotated_access_token = Some(fresh),
                Err(e) => tracing::warn!(error = %e, "access token rotation failed"),
            }
        }
        Some(resolved)
    }
}

/// Federation probe via `X-Identity-Token`. Best effort; failures are logged.
pub struct FederationStrategy;

#[async_trait]
impl AuthStrategy for FederationStrategy {
    fn name(&self) -> &'static str {
        "federation"
    }

    async fn resolve(&self, attempt: &AuthAttempt<'_>, state: &AppState) -> Option<Resolved> {
        let token = attempt
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())?;
        let provider = state.federation.as_ref()?;

        let identity = match provider.verify(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(provider = provider.name(), error = %e, "federation probe failed");
                return None;
            }
        };

        match find_or_create_federated_user(state.directory.as_ref(), &identity).await {
            Ok(record) => Some(Resolved::new(&record, AuthMethod::Federation)),
            Err(e) => {
                tracing::warn!(error = %e, "federation probe could not resolve a local user");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

pub struct Authenticator {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl Authenticator {
    pub fn new(strategies: Vec<Box<dyn AuthStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First strategy to resolve wins; later ones are not consulted.
    pub async fn resolve(&self, attempt: &AuthAttempt<'_>, state: &AppState) -> Option<Resolved> {
        for strategy in &self.strategies {
            if let Some(resolved) = strategy.resolve(attempt, state).await {
                tracing::debug!(strategy = strategy.name(), user_id = %resolved.principal.id, "authenticated");
                return Some(resolved);
            }
        }
        None
    }
}

impl Default for Authenticator {
    /// Session, then bearer, then federation.
    fn default() -> Self {
        Self::new(vec![
            Box::new(SessionStrategy),
            Box::new(BearerStrategy),
            Box::new(FederationStrategy),
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public paths
// ─────────────────────────────────────────────────────────────────────────────

/// Paths that may be served without a principal.
#[derive(Debug, Clone)]
pub struct PublicPaths {
    exact: Vec<&'static str>,
    prefixes: Vec<&'static str>,
    /// Content collections whose single items are publicly readable by id.
    readable_content: Vec<&'static str>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self {
            exact: vec![
                "/api/login",
                "/api/register",
                "/api/federated-login",
                "/api/refresh-token",
                "/api/logout",
                "/api/health",
                "/api/csrf-token",
            ],
            prefixes: vec!["/api/public/"],
            readable_content: vec!["blog-posts"],
        }
    }
}

impl PublicPaths {
    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };

        if self.exact.iter().any(|p| *p == path) {
            return true;
        }
        if self.prefixes.iter().any(|p| path.starts_with(p)) {
            return true;
        }
        if *method == Method::GET {
            if let Some(rest) = path.strip_prefix("/api/") {
                if let Some((collection, id)) = rest.split_once('/') {
                    return self.readable_content.iter().any(|c| *c == collection)
                        && !id.is_empty()
                        && id.bytes().all(|b| b.is_ascii_digit());
                }
            }
        }
        false
    }
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

pub async fn authenticate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let session = parts.extensions.get::<Session>().cloned();
    let resolved = {
        let attempt = AuthAttempt {
            headers: &parts.headers,
            uri: &parts.uri,
            session: session.as_ref(),
        };
        state.authenticator.resolve(&attempt, &state).await
    };

    let mut rotated = None;
    match resolved {
        Some(resolved) => {
            rotated = resolved.rotated_access_token;
            parts
                .extensions
                .insert(PrincipalContext::new(resolved.principal, resolved.method));
        }
        None => {
            let path = parts.uri.path();
            if is_api_path(path) && !state.public_paths.is_public(&parts.method, path) {
                tracing::debug!(method = %parts.method, path, "unauthenticated request rejected");
                return unauthorized();
            }
        }
    }

    let mut response = next.run(Request::from_parts(parts, body)).await;

    if let Some(token) = rotated {
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(ACCESS_HEADER, value);
        }
        let cookie = state
            .cookies
            .http_only(ACCESS_COOKIE, token, state.config.access_ttl);
        append_cookie(&mut response, &cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths() {
        let public = PublicPaths::default();
        assert!(public.is_public(&Method::POST, "/api/login"));
        assert!(public.is_public(&Method::GET, "/api/health/"));
        assert!(public.is_public(&Method::GET, "/api/public/announcements"));
        assert!(public.is_public(&Method::GET, "/api/blog-posts/12"));

        assert!(!public.is_public(&Method::DELETE, "/api/blog-posts/12"));
        assert!(!public.is_public(&Method::GET, "/api/blog-posts/latest"));
        assert!(!public.is_public(&Method::GET, "/api/blog-posts"));
        assert!(!public.is_public(&Method::GET, "/api/projects/1"));
        assert!(!public.is_public(&Method::GET, "/api/current-user"));
    }

    #[test]
    fn bearer_sources_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("access_token=from-cookie"),
        );
        let uri: Uri = "/api/x?access_token=from-query".parse().unwrap();

        let attempt = AuthAttempt {
            headers: &headers,
            uri: &uri,
            session: None,
        };
        assert_eq!(BearerStrategy::token(&attempt).as_deref(), Some("from-header"));

        headers.remove(AUTHORIZATION);
        let attempt = AuthAttempt {
            headers: &headers,
            uri: &uri,
            session: None,
        };
        assert_eq!(BearerStrategy::token(&attempt).as_deref(), Some("from-cookie"));

        let empty = HeaderMap::new();
        let attempt = AuthAttempt {
            headers: &empty,
            uri: &uri,
            session: None,
        };
        assert_eq!(BearerStrategy::token(&attempt).as_deref(), Some("from-query"));
    }

    #[test]
    fn default_strategy_order() {
        assert_eq!(
            Authenticator::default().strategy_names(),
            vec!["session", "bearer", "federation"]
        );
    }
}
