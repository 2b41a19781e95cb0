use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::config::RateLimitConfig;

/// Counter for one identifier within the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

/// Outcome of a rate-limit check, with the data for the response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,

    /// Seconds until the window resets, rounded up. Zero when allowed.
    pub retry_after_seconds: u64,
}

impl RateLimitStatus {
    /// Window reset as epoch seconds, rounded up
    pub fn reset_epoch_seconds(&self) -> i64 {
        ceil_div(self.reset_at.timestamp_millis(), 1000)
    }
}

/// Fixed-window counter per identifier.
///
/// Entries are only trusted while `now <= window_reset_at`; the periodic sweep just
/// bounds memory.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    cleanup_probability: f64,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, cleanup_probability: f64) -> Self {
        Self {
            max_requests,
            window,
            cleanup_probability,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_requests,
            Duration::seconds(config.window_seconds as i64),
            config.cleanup_probability,
        )
    }

    pub fn check(&self, identifier: &str) -> RateLimitStatus {
        self.check_at(identifier, Utc::now())
    }

    /// Count a request for `identifier` at `now`
    pub fn check_at(&self, identifier: &str, now: DateTime<Utc>) -> RateLimitStatus {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if self.cleanup_probability > 0.0 && rand::random::<f64>() < self.cleanup_probability {
            let before = entries.len();
            entries.retain(|_, entry| now <= entry.window_reset_at);
            tracing::debug!(evicted = before - entries.len(), "Swept expired rate-limit entries");
        }

        match entries.get_mut(identifier) {
            Some(entry) if now <= entry.window_reset_at => {
                if entry.count >= self.max_requests {
                    let wait_ms = (entry.window_reset_at - now).num_milliseconds();
                    return RateLimitStatus {
                        allowed: false,
                        limit: self.max_requests,
                        remaining: 0,
                        reset_at: entry.window_reset_at,
                        retry_after_seconds: ceil_div(wait_ms, 1000).max(1) as u64,
                    };
                }

                entry.count += 1;
                RateLimitStatus {
                    allowed: true,
                    limit: self.max_requests,
                    remaining: self.max_requests - entry.count,
                    reset_at: entry.window_reset_at,
                    retry_after_seconds: 0,
                }
            }
            _ => {
                let entry = RateLimitEntry {
                    count: 1,
                    window_reset_at: now + self.window,
                };
                entries.insert(identifier.to_string(), entry);

                RateLimitStatus {
                    allowed: true,
                    limit: self.max_requests,
                    remaining: self.max_requests.saturating_sub(1),
                    reset_at: entry.window_reset_at,
                    retry_after_seconds: 0,
                }
            }
        }
    }

    #[cfg(test)]
    pub fn tracked_identifiers(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    pub fn entry(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .copied()
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value / divisor;
    if value % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(max, Duration::seconds(60), 0.0)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_allows_up_to_max() {
        let limiter = limiter(3);
        let now = t0();

        let remaining: Vec<u32> = (0..3)
            .map(|i| {
                let status = limiter.check_at("key", now + Duration::seconds(i));
                assert!(status.allowed);
                status.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = limiter.check_at("key", now + Duration::seconds(10));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after_seconds, 50);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let limiter = limiter(1);
        let now = t0();
        limiter.check_at("ip", now);

        let denied = limiter.check_at("ip", now + Duration::milliseconds(59_001));
        assert_eq!(denied.retry_after_seconds, 1);

        let denied = limiter.check_at("ip", now + Duration::milliseconds(500));
        assert_eq!(denied.retry_after_seconds, 60);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = limiter(3);
        let now = t0();
        for _ in 0..4 {
            limiter.check_at("key", now);
        }

        let later = now + Duration::seconds(61);
        let status = limiter.check_at("key", later);
        assert!(status.allowed);
        assert_eq!(status.remaining, 2);
        assert_eq!(limiter.entry("key").unwrap().count, 1);
        assert_eq!(
            limiter.entry("key").unwrap().window_reset_at,
            later + Duration::seconds(60)
        );
    }

    #[test]
    fn test_boundary_instant_still_in_window() {
        let limiter = limiter(1);
        let now = t0();
        limiter.check_at("key", now);

        assert!(!limiter.check_at("key", now + Duration::seconds(60)).allowed);
        assert!(limiter.check_at("key", now + Duration::milliseconds(60_001)).allowed);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = limiter(1);
        let now = t0();

        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
    }

    #[test]
    fn test_reset_epoch_rounds_up() {
        let limiter = limiter(5);
        let now = t0() + Duration::milliseconds(250);
        let status = limiter.check_at("key", now);

        assert_eq!(status.reset_epoch_seconds(), t0().timestamp() + 61);
    }

    #[test]
    fn test_sweep_evicts_only_expired() {
        let limiter = RateLimiter::new(5, Duration::seconds(60), 1.0);
        let now = t0();
        limiter.check_at("old", now);
        limiter.check_at("fresh", now + Duration::seconds(30));
        assert_eq!(limiter.tracked_identifiers(), 2);

        // Sweeps on every request with probability 1.0
        limiter.check_at("fresh", now + Duration::seconds(70));
        assert_eq!(limiter.tracked_identifiers(), 1);
        assert!(limiter.entry("old").is_none());
    }
}
