//! Double-submit CSRF tokens.
//!
//! The cookie/header equality is the only thing that authorizes a mutating
//! request. [`CsrfRegistry`] merely remembers what was handed out, for
//! observability and periodic cleanup.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

const TOKEN_BYTES: usize = 32;

/// Sweep on every Nth issuance, in addition to the periodic task.
const SWEEP_EVERY: u64 = 100;

/// Generate a fresh random token (hex).
pub fn generate_csrf_token() -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);
    hex::encode(raw)
}

/// Constant-time equality of the submitted and cookie values.
///
/// Empty values never match.
pub fn tokens_match(submitted: &str, cookie: &str) -> bool {
    if submitted.is_empty() || cookie.is_empty() {
        return false;
    }
    submitted.as_bytes().ct_eq(cookie.as_bytes()).into()
}

/// Advisory registry of issued tokens with their issue time.
#[derive(Debug)]
pub struct CsrfRegistry {
    issued: DashMap<String, DateTime<Utc>>,
    retention: Duration,
    issued_count: AtomicU64,
}

impl CsrfRegistry {
    pub const DEFAULT_RETENTION_HOURS: i64 = 24;

    pub fn new(retention: Duration) -> Self {
        Self {
            issued: DashMap::new(),
            retention,
            issued_count: AtomicU64::new(0),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Mint a token and record it.
    pub fn issue(&self) -> String {
        let token = generate_csrf_token();
        self.record(token.clone(), Utc::now());
        token
    }

    pub fn record(&self, token: String, at: DateTime<Utc>) {
        self.issued.insert(token, at);

        let n = self.issued_count.fetch_add(1, Ordering::Relaxed);
        if n % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(Utc::now());
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.issued.contains_key(token)
    }

    /// Drop entries older than the retention window. Returns how many went.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.issued.len();
        let cutoff = now - self.retention;
        self.issued.retain(|_, issued_at| *issued_at > cutoff);
        let removed = before.saturating_sub(self.issued.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.issued.len(), "swept stale csrf tokens");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

impl Default for CsrfRegistry {
    fn default() -> Self {
        Self::new(Duration::hours(Self::DEFAULT_RETENTION_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_csrf_token();
        let b = generate_csrf_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn matching_is_exact() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "xyz"));
        assert!(!tokens_match("abc", "abcd"));
        assert!(!tokens_match("", ""));
    }

    #[test]
    fn sweep_drops_only_stale_entries() {
        let registry = CsrfRegistry::default();
        let now = Utc::now();
        registry.record("old".into(), now - Duration::hours(25));
        registry.record("fresh".into(), now - Duration::hours(1));

        assert_eq!(registry.sweep(now), 1);
        assert!(!registry.contains("old"));
        assert!(registry.contains("fresh"));
    }

    #[test]
    fn issue_records_the_token() {
        let registry = CsrfRegistry::new(Duration::hours(1));
        let token = registry.issue();
        assert!(registry.contains(&token));
        assert_eq!(registry.len(), 1);
    }
}
