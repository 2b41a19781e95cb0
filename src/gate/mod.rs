//! Per-request admission: API-key check first, then rate limiting.

use std::collections::HashSet;

pub mod rate_limit;

pub use rate_limit::{RateLimitEntry, RateLimitStatus, RateLimiter};

use crate::config::Config;

/// Identifier used when a request carries neither a key nor an IP header
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers relevant to admission, already extracted from the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub api_key: Option<String>,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
}

impl RequestIdentity {
    /// First forwarded-for hop, else real IP, else `unknown`
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or_else(|| self.real_ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty()))
            .unwrap_or(UNKNOWN_CLIENT)
            .to_string()
    }

    /// Rate-limit identity: the API key when present, else the client IP
    pub fn rate_limit_key(&self) -> String {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.client_ip())
    }
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No `x-api-key` header while keys are configured
    MissingApiKey,
    /// Key not in the configured set
    InvalidApiKey,
    RateLimited(RateLimitStatus),
}

impl Denial {
    pub fn message(&self) -> String {
        match self {
            Denial::MissingApiKey => "Missing API key. Include 'x-api-key' header.".to_string(),
            Denial::InvalidApiKey => "Invalid API key.".to_string(),
            Denial::RateLimited(_) => "Rate limit exceeded. Try again later.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(RateLimitStatus),
    Denied(Denial),
}

/// Set of accepted API keys. An empty set admits everyone.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyValidator {
    keys: HashSet<String>,
}

impl ApiKeyValidator {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn validate(&self, api_key: Option<&str>) -> Result<(), Denial> {
        if self.is_open() {
            return Ok(());
        }

        match api_key {
            None | Some("") => Err(Denial::MissingApiKey),
            Some(key) if self.keys.contains(key) => Ok(()),
            Some(_) => Err(Denial::InvalidApiKey),
        }
    }
}

/// API-key validation followed by rate limiting
pub struct RequestGate {
    keys: ApiKeyValidator,
    limiter: RateLimiter,
}

impl RequestGate {
    pub fn new(keys: ApiKeyValidator, limiter: RateLimiter) -> Self {
        if keys.is_open() {
            tracing::warn!("No API keys configured; running in open mode");
        }
        Self { keys, limiter }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ApiKeyValidator::new(config.auth.api_keys.iter().cloned()),
            RateLimiter::from_config(&config.rate_limit),
        )
    }

    /// Admit or deny a request. Short-circuits on the first failing check.
    pub fn admit(&self, identity: &RequestIdentity) -> Decision {
        if let Err(denial) = self.keys.validate(identity.api_key.as_deref()) {
            tracing::info!(reason = ?denial, "Request rejected by API-key check");
            return Decision::Denied(denial);
        }

        let key = identity.rate_limit_key();
        let status = self.limiter.check(&key);
        if status.allowed {
            Decision::Allowed(status)
        } else {
            tracing::info!(
                identifier = %key,
                retry_after = status.retry_after_seconds,
                "Request rejected by rate limiter"
            );
            Decision::Denied(Denial::RateLimited(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity(api_key: Option<&str>, forwarded: Option<&str>, real_ip: Option<&str>) -> RequestIdentity {
        RequestIdentity {
            api_key: api_key.map(String::from),
            forwarded_for: forwarded.map(String::from),
            real_ip: real_ip.map(String::from),
        }
    }

    fn gate(keys: &[&str], max: u32) -> RequestGate {
        RequestGate::new(
            ApiKeyValidator::new(keys.iter().copied()),
            RateLimiter::new(max, Duration::seconds(60), 0.0),
        )
    }

    #[test]
    fn test_identity_precedence() {
        assert_eq!(identity(Some("k"), Some("1.1.1.1"), None).rate_limit_key(), "k");
        assert_eq!(
            identity(None, Some(" 203.0.113.5 , 10.0.0.1"), Some("9.9.9.9")).rate_limit_key(),
            "203.0.113.5"
        );
        assert_eq!(identity(None, None, Some("9.9.9.9")).rate_limit_key(), "9.9.9.9");
        assert_eq!(identity(None, Some(""), None).rate_limit_key(), UNKNOWN_CLIENT);
        assert_eq!(identity(Some(""), None, None).rate_limit_key(), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_open_mode_admits_everyone() {
        let gate = gate(&[], 10);
        assert!(matches!(gate.admit(&identity(None, None, None)), Decision::Allowed(_)));
        assert!(matches!(gate.admit(&identity(Some("anything"), None, None)), Decision::Allowed(_)));
    }

    #[test]
    fn test_key_checks() {
        let gate = gate(&["good"], 10);
        assert_eq!(
            gate.admit(&identity(None, None, None)),
            Decision::Denied(Denial::MissingApiKey)
        );
        assert_eq!(
            gate.admit(&identity(Some("bad"), None, None)),
            Decision::Denied(Denial::InvalidApiKey)
        );
        assert!(matches!(gate.admit(&identity(Some("good"), None, None)), Decision::Allowed(_)));
    }

    #[test]
    fn test_rejected_key_does_not_consume_quota() {
        let gate = gate(&["good"], 1);
        gate.admit(&identity(Some("bad"), None, None));
        assert_eq!(gate.limiter.tracked_identifiers(), 0);
    }

    #[test]
    fn test_rate_limit_after_auth() {
        let gate = gate(&[], 2);
        let client = identity(None, Some("198.51.100.7"), None);

        assert!(matches!(gate.admit(&client), Decision::Allowed(s) if s.remaining == 1));
        assert!(matches!(gate.admit(&client), Decision::Allowed(s) if s.remaining == 0));
        match gate.admit(&client) {
            Decision::Denied(Denial::RateLimited(status)) => {
                assert!(status.retry_after_seconds > 0);
                assert_eq!(status.limit, 2);
            }
            other => panic!("expected rate limit denial, got {:?}", other),
        }
    }
}
