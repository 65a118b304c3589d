//! Cookie names and attributes.

use axum::http::{HeaderValue, Response, header::SET_COOKIE};
use axum_extra::extract::cookie::{Cookie, SameSite};

use warden_core::DeploymentMode;

pub const SESSION_COOKIE: &str = "warden.sid";
pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const ACCESS_HEADER: &str = "x-access-token";
pub const IDENTITY_HEADER: &str = "x-identity-token";

/// Cookie attributes derived from the deployment.
///
/// | deployment              | SameSite | Secure |
/// |-------------------------|----------|--------|
/// | cross-domain            | None     | yes    |
/// | production, same origin | Lax      | yes    |
/// | development             | Lax      | no     |
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    secure: bool,
    cross_site: bool,
}

impl CookiePolicy {
    pub fn for_deployment(mode: DeploymentMode, cross_domain: bool) -> Self {
        Self {
            secure: cross_domain || mode.is_production(),
            cross_site: cross_domain,
        }
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn same_site(&self) -> SameSite {
        if self.cross_site {
            SameSite::None
        } else {
            SameSite::Lax
        }
    }

    /// Same attribute for the session layer's cookie type.
    pub fn session_same_site(&self) -> tower_sessions::cookie::SameSite {
        if self.cross_site {
            tower_sessions::cookie::SameSite::None
        } else {
            tower_sessions::cookie::SameSite::Lax
        }
    }

    /// HTTP-only cookie (tokens).
    pub fn http_only(&self, name: &'static str, value: String, max_age: chrono::Duration) -> Cookie<'static> {
        self.build(name, value, max_age, true)
    }

    /// Cookie scripts may read (the CSRF token).
    pub fn script_readable(
        &self,
        name: &'static str,
        value: String,
        max_age: chrono::Duration,
    ) -> Cookie<'static> {
        self.build(name, value, max_age, false)
    }

    /// Expired cookie that clears `name` on the client.
    pub fn removal(&self, name: &'static str) -> Cookie<'static> {
        self.build(name, String::new(), chrono::Duration::zero(), true)
    }

    fn build(
        &self,
        name: &'static str,
        value: String,
        max_age: chrono::Duration,
        http_only: bool,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(http_only)
            .secure(self.secure)
            .same_site(self.same_site())
            .path("/")
            .max_age(time::Duration::seconds(max_age.num_seconds()))
            .build()
    }
}

/// Append a `Set-Cookie` header without disturbing ones already present.
pub fn append_cookie<B>(response: &mut Response<B>, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::error!(cookie = cookie.name(), error = %e, "unencodable cookie"),
    }
}
