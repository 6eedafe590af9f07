//! Fixed-window request limiting keyed by client.
//!
//! The store is injected wherever limits are enforced; the in-memory
//! implementation suits a single process.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW_SECS: i64 = 15 * 60;
pub const LOGIN_MAX_REQUESTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::seconds(DEFAULT_WINDOW_SECS),
        }
    }
}

impl RateLimitPolicy {
    /// The stricter policy for credential checks.
    #[must_use]
    pub fn login() -> Self {
        Self {
            max_requests: LOGIN_MAX_REQUESTS,
            ..Self::default()
        }
    }
}

/// Outcome of counting one request against a key's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub trait RateLimitStore: Send + Sync {
    /// Count a request for `key` at `now`.
    fn hit(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision;

    /// Drop windows that ended before `now`; returns how many were dropped.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Process-local store. Each instance has its own counters.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    policy: RateLimitPolicy,
    windows: DashMap<String, Window>,
}

impl InMemoryRateLimiter {
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl RateLimitStore for InMemoryRateLimiter {
    fn hit(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let limit = self.policy.max_requests;
        let fresh = Window {
            count: 0,
            reset_at: now + self.policy.window,
        };

        // The entry guard holds the shard lock until the decision is made.
        let mut window = self.windows.entry(key.to_owned()).or_insert(fresh);
        if now > window.reset_at {
            *window = fresh;
        }

        if window.count >= limit {
            debug!(key, limit, "rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: window.reset_at,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_at: window.reset_at,
        }
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now <= w.reset_at);
        before.saturating_sub(self.windows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::time::fixed_now;

    fn limiter(max: u32) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(RateLimitPolicy {
            max_requests: max,
            window: Duration::seconds(60),
        })
    }

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = limiter(3);
        let now = fixed_now();

        let remaining: Vec<u32> = (0..3).map(|_| limiter.hit("1.2.3.4", now).remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let rejected = limiter.hit("1.2.3.4", now);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_at, now + Duration::seconds(60));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1);
        let now = fixed_now();
        assert!(limiter.hit("a", now).allowed);
        assert!(!limiter.hit("a", now).allowed);
        assert!(limiter.hit("b", now).allowed);
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = limiter(1);
        let now = fixed_now();
        assert!(limiter.hit("a", now).allowed);
        assert!(!limiter.hit("a", now + Duration::seconds(60)).allowed);

        let later = now + Duration::seconds(61);
        let fresh = limiter.hit("a", later);
        assert!(fresh.allowed);
        assert_eq!(fresh.reset_at, later + Duration::seconds(60));
    }

    #[test]
    fn purge_drops_only_ended_windows() {
        let limiter = limiter(10);
        let now = fixed_now();
        limiter.hit("old", now);
        limiter.hit("new", now + Duration::seconds(30));

        assert_eq!(limiter.purge_expired(now + Duration::seconds(75)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_hits_never_exceed_the_limit() {
        let limiter = std::sync::Arc::new(limiter(50));
        let now = fixed_now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = std::sync::Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..20).filter(|_| limiter.hit("shared", now).allowed).count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(allowed, 50);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn login_policy_is_stricter() {
        let login = RateLimitPolicy::login();
        assert_eq!(login.max_requests, 5);
        assert_eq!(login.window, RateLimitPolicy::default().window);
    }
}
