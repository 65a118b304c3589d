//! Double-submit CSRF guard.

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use warden_auth::tokens_match;

use crate::app::AppState;
use crate::app::cookies::{CSRF_COOKIE, CSRF_HEADER, append_cookie};
use crate::app::errors::json_error;

const BODY_FIELD: &str = "_csrf";
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Token minted for this request because it arrived without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCsrfToken(pub String);

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `_csrf` from a JSON object or urlencoded form body.
fn body_token(content_type: Option<&str>, body: &[u8]) -> Option<String> {
    let content_type = content_type.unwrap_or_default();
    if content_type.starts_with("application/json") {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        return value.get(BODY_FIELD)?.as_str().map(str::to_string);
    }
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let body = std::str::from_utf8(body).ok()?;
        return body
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == BODY_FIELD)
            .map(|(_, value)| value.to_string());
    }
    None
}

fn reject(method: &Method, path: &str) -> Response {
    tracing::warn!(method = %method, path, "csrf token missing or mismatched");
    if path == "/api" || path.starts_with("/api/") {
        json_error(StatusCode::FORBIDDEN, "csrf_mismatch", "csrf token missing or mismatched")
    } else {
        Redirect::to("/").into_response()
    }
}

pub async fn csrf_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let cookie = cookie_token(req.headers());

    if is_safe(req.method()) {
        let issued = match cookie {
            Some(_) => None,
            None => {
                let token = state.csrf.issue();
                req.extensions_mut().insert(IssuedCsrfToken(token.clone()));
                Some(token)
            }
        };

        let mut response = next.run(req).await;
        if let Some(token) = issued {
            if let Ok(value) = HeaderValue::from_str(&token) {
                response.headers_mut().insert(CSRF_HEADER, value);
            }
            let cookie = state
                .cookies
                .script_readable(CSRF_COOKIE, token, state.csrf.retention());
            append_cookie(&mut response, &cookie);
        }
        return response;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let Some(cookie) = cookie else {
        return reject(&method, &path);
    };

    if let Some(submitted) = header_token(req.headers()) {
        if tokens_match(&submitted, &cookie) {
            return next.run(req).await;
        }
        return reject(&method, &path);
    }

    // Header absent: fall back to the body field, then restore the body.
    let (parts, body) = req.into_parts();
    let bytes: Bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return json_error(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", "request body too large"),
    };
    let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let matched = body_token(content_type, &bytes).is_some_and(|submitted| tokens_match(&submitted, &cookie));
    if !matched {
        return reject(&method, &path);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
