//! Process configuration, read from the environment once at startup.

use std::net::SocketAddr;

use anyhow::{Context, bail};
use chrono::Duration;

use warden_auth::{CsrfRegistry, ProviderCredentials, TokenIssuer};
use warden_core::DeploymentMode;
use warden_observability::LogFormat;

const DEV_JWT_SECRET: &str = "warden-dev-jwt-secret";
const DEV_SESSION_SECRET: &str = "warden-dev-session-secret";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Unset `APP_ENV` means development in debug builds, production in release.
    pub mode: DeploymentMode,
    pub log_format: LogFormat,
    pub cross_domain: bool,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub session_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub refresh_threshold: Duration,
    pub csrf_retention: Duration,
    pub identity_provider: Option<ProviderCredentials>,
    pub bind_addr: SocketAddr,
    pub migrate_legacy_secrets: bool,
    pub bootstrap_admin: Option<(String, String)>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode: DeploymentMode = match var("APP_ENV") {
            Some(raw) => raw.parse().context("APP_ENV")?,
            None => DeploymentMode::default(),
        };

        let jwt_secret = secret(var("JWT_SECRET"), "JWT_SECRET", DEV_JWT_SECRET, mode)?;
        let session_secret =
            secret(var("SESSION_SECRET"), "SESSION_SECRET", DEV_SESSION_SECRET, mode)?;
        let jwt_refresh_secret = var("JWT_REFRESH_SECRET").unwrap_or_else(|| jwt_secret.clone());

        let identity_provider = match (var("IDP_ISSUER"), var("IDP_AUDIENCE"), var("IDP_PUBLIC_KEY_PEM")) {
            (Some(issuer), Some(audience), Some(public_key_pem)) => Some(ProviderCredentials {
                issuer,
                audience,
                public_key_pem,
            }),
            (None, None, None) => None,
            _ => bail!("IDP_ISSUER, IDP_AUDIENCE and IDP_PUBLIC_KEY_PEM must be set together"),
        };

        let bootstrap_admin = match (
            var("BOOTSTRAP_ADMIN_USERNAME"),
            var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        let log_format: LogFormat = match var("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg).context("LOG_FORMAT")?,
            None => LogFormat::default(),
        };

        Ok(Self {
            mode,
            log_format,
            cross_domain: flag(var("CROSS_DOMAIN"), "CROSS_DOMAIN")?,
            jwt_secret,
            jwt_refresh_secret,
            session_secret,
            access_ttl: Duration::minutes(number(
                var("ACCESS_TOKEN_TTL_MINUTES"),
                "ACCESS_TOKEN_TTL_MINUTES",
                TokenIssuer::DEFAULT_ACCESS_TTL_MINUTES,
            )?),
            refresh_ttl: Duration::days(number(
                var("REFRESH_TOKEN_TTL_DAYS"),
                "REFRESH_TOKEN_TTL_DAYS",
                TokenIssuer::DEFAULT_REFRESH_TTL_DAYS,
            )?),
            refresh_threshold: Duration::seconds(number(
                var("TOKEN_REFRESH_THRESHOLD_SECONDS"),
                "TOKEN_REFRESH_THRESHOLD_SECONDS",
                300,
            )?),
            csrf_retention: Duration::hours(number(
                var("CSRF_RETENTION_HOURS"),
                "CSRF_RETENTION_HOURS",
                CsrfRegistry::DEFAULT_RETENTION_HOURS,
            )?),
            identity_provider,
            bind_addr: var("BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string())
                .parse()
                .context("BIND_ADDR is not a socket address")?,
            migrate_legacy_secrets: flag(var("MIGRATE_LEGACY_SECRETS"), "MIGRATE_LEGACY_SECRETS")?,
            bootstrap_admin,
        })
    }

    /// Deterministic development configuration.
    pub fn for_tests() -> Self {
        Self {
            mode: DeploymentMode::Development,
            log_format: LogFormat::Json,
            cross_domain: false,
            jwt_secret: "test-access-secret".to_string(),
            jwt_refresh_secret: "test-refresh-secret".to_string(),
            session_secret: "test-session-secret".to_string(),
            access_ttl: Duration::minutes(TokenIssuer::DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::days(TokenIssuer::DEFAULT_REFRESH_TTL_DAYS),
            refresh_threshold: Duration::seconds(300),
            csrf_retention: Duration::hours(CsrfRegistry::DEFAULT_RETENTION_HOURS),
            identity_provider: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            migrate_legacy_secrets: false,
            bootstrap_admin: None,
        }
    }

    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.jwt_secret.as_bytes(), self.jwt_refresh_secret.as_bytes())
            .with_lifetimes(self.access_ttl, self.refresh_ttl)
    }
}

fn secret(
    value: Option<String>,
    key: &str,
    dev_default: &str,
    mode: DeploymentMode,
) -> anyhow::Result<String> {
    match value {
        Some(v) => Ok(v),
        None if mode.is_production() => bail!("{key} must be set in production"),
        None => {
            tracing::warn!(key, "secret not set; using insecure development default");
            Ok(dev_default.to_string())
        }
    }
}

fn flag(value: Option<String>, key: &str) -> anyhow::Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{key}: expected a boolean, got '{other}'"),
    }
}

fn number(value: Option<String>, key: &str, default: i64) -> anyhow::Result<i64> {
    let Some(raw) = value else {
        return Ok(default);
    };
    let n: i64 = raw
        .parse()
        .with_context(|| format!("{key}: expected an integer, got '{raw}'"))?;
    if n <= 0 {
        bail!("{key} must be positive");
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn development_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("APP_ENV", "development")])).unwrap();
        assert_eq!(config.mode, DeploymentMode::Development);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.jwt_refresh_secret, config.jwt_secret);
        assert_eq!(config.access_ttl, Duration::minutes(15));
        assert_eq!(config.refresh_ttl, Duration::days(7));
        assert!(!config.cross_domain);
        assert!(config.identity_provider.is_none());
    }

    #[test]
    fn unset_app_env_follows_build_profile() {
        let result = AppConfig::from_lookup(lookup(&[]));
        if cfg!(debug_assertions) {
            assert_eq!(result.unwrap().mode, DeploymentMode::Development);
        } else {
            // Release builds start as production and refuse the dev secrets.
            assert!(result.unwrap_err().to_string().contains("JWT_SECRET"));
        }
    }

    #[test]
    fn log_format_is_selectable() {
        let config = AppConfig::from_lookup(lookup(&[("APP_ENV", "dev"), ("LOG_FORMAT", "pretty")])).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(AppConfig::from_lookup(lookup(&[("APP_ENV", "dev"), ("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn production_requires_secrets() {
        let err = AppConfig::from_lookup(lookup(&[("APP_ENV", "production")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let ok = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "a"),
            ("SESSION_SECRET", "b"),
            ("CROSS_DOMAIN", "true"),
        ]))
        .unwrap();
        assert!(ok.mode.is_production());
        assert!(ok.cross_domain);
    }

    #[test]
    fn partial_identity_provider_is_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("APP_ENV", "dev"), ("IDP_ISSUER", "https://idp")])).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("APP_ENV", "dev"), ("ACCESS_TOKEN_TTL_MINUTES", "soon")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("APP_ENV", "dev"), ("REFRESH_TOKEN_TTL_DAYS", "0")])).is_err());
    }
}
