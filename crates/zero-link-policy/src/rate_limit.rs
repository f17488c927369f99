//! Rate limiting implementation.

use crate::{
    errors::{PolicyError, Result},
    types::{OAuthEndpoint, RateLimit, RateLimitConfig},
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

const MAX_ENTRIES: usize = 10_000;
/// Size a prune shrinks the table to; the next prune is at least this far off
const PRUNE_TARGET: usize = MAX_ENTRIES - MAX_ENTRIES / 10;

/// Fixed-window counter keyed by an arbitrary string
pub struct RateLimiter {
    limits: Mutex<HashMap<String, LimitState>>,
}

#[derive(Debug, Clone)]
struct LimitState {
    attempts: u32,
    window_start: u64,
    window_seconds: u64,
    max_attempts: u32,
    last_seen: u64,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new() -> Self {
        Self {
            limits: Mutex::new(HashMap::new()),
        }
    }

    // Counters stay usable after a panic elsewhere; worst case one window is off.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, LimitState>> {
        self.limits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count an attempt for `key`
    ///
    /// Returns `Ok(RateLimit)` with remaining attempts, or `Err(reset_at)`
    /// when the window is exhausted.
    pub fn check(
        &self,
        key: &str,
        window_seconds: u64,
        max_attempts: u32,
        current_time: u64,
    ) -> std::result::Result<RateLimit, u64> {
        let mut limits = self.lock();

        let outcome = {
            let state = limits.entry(key.to_string()).or_insert(LimitState {
                attempts: 0,
                window_start: current_time,
                window_seconds,
                max_attempts,
                last_seen: current_time,
            });

            if current_time >= state.window_start + state.window_seconds {
                state.window_start = current_time;
                state.attempts = 0;
            }

            let reset_at = state.window_start + state.window_seconds;
            if state.attempts >= state.max_attempts {
                Err(reset_at)
            } else {
                state.attempts += 1;
                state.last_seen = current_time;

                Ok(RateLimit {
                    window_seconds: state.window_seconds,
                    max_attempts: state.max_attempts,
                    remaining: state.max_attempts - state.attempts,
                    reset_at,
                })
            }
        };

        cleanup_limits(&mut limits, current_time);

        outcome
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no key is tracked
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Prune once the table outgrows `MAX_ENTRIES`.
///
/// Expired windows go first, then the least recently seen keys until the
/// table is down to `PRUNE_TARGET`. Each pass is linear, and at least
/// `MAX_ENTRIES - PRUNE_TARGET` new keys must arrive before the next one.
fn cleanup_limits(limits: &mut HashMap<String, LimitState>, current_time: u64) {
    if limits.len() <= MAX_ENTRIES {
        return;
    }

    remove_expired(limits, current_time);

    if limits.len() > PRUNE_TARGET {
        let excess = limits.len() - PRUNE_TARGET;
        evict_least_recent(limits, excess);
    }
}

fn remove_expired(limits: &mut HashMap<String, LimitState>, current_time: u64) {
    limits.retain(|_, state| current_time < state.window_start + state.window_seconds);
}

fn evict_least_recent(limits: &mut HashMap<String, LimitState>, count: usize) {
    let mut entries: Vec<(u64, String)> = limits
        .iter()
        .map(|(key, state)| (state.last_seen, key.clone()))
        .collect();

    // Partition around the cut instead of sorting everything
    entries.select_nth_unstable_by_key(count - 1, |(last_seen, _)| *last_seen);

    for (_, key) in entries.into_iter().take(count) {
        limits.remove(&key);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-endpoint limiter for the OAuth flow, keyed by client address
pub struct OAuthRateLimits {
    config: RateLimitConfig,
    limiter: RateLimiter,
}

impl OAuthRateLimits {
    /// Create limits with the given ceilings
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiter: RateLimiter::new(),
        }
    }

    /// Configured ceilings
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `client_addr` against `endpoint`
    pub fn check(
        &self,
        endpoint: OAuthEndpoint,
        client_addr: &str,
        current_time: u64,
    ) -> Result<RateLimit> {
        let rule = self.config.rule(endpoint);
        let key = format!("{}:{}", endpoint.as_str(), client_addr);

        self.limiter
            .check(&key, rule.window_seconds, rule.max_attempts, current_time)
            .map_err(|reset_at| {
                let retry_after_seconds = reset_at.saturating_sub(current_time).max(1);
                warn!(
                    endpoint = %endpoint,
                    client_addr = %client_addr,
                    retry_after_seconds,
                    "Rate limit exceeded"
                );
                PolicyError::RateLimited {
                    endpoint,
                    retry_after_seconds,
                }
            })
    }
}

impl Default for OAuthRateLimits {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RateLimitRule;

    #[test]
    fn test_rate_limit_allow() {
        let limiter = RateLimiter::new();

        let limit = limiter.check("test-key", 60, 5, 1000).unwrap();
        assert_eq!(limit.remaining, 4);
        assert_eq!(limit.reset_at, 1060);
    }

    #[test]
    fn test_rate_limit_exceed() {
        let limiter = RateLimiter::new();

        for _ in 0..5 {
            assert!(limiter.check("test-key", 60, 5, 1000).is_ok());
        }

        assert_eq!(limiter.check("test-key", 60, 5, 1010), Err(1060));
    }

    #[test]
    fn test_rate_limit_window_reset() {
        let limiter = RateLimiter::new();

        for _ in 0..5 {
            let _ = limiter.check("test-key", 60, 5, 1000);
        }
        assert!(limiter.check("test-key", 60, 5, 1000).is_err());

        let limit = limiter.check("test-key", 60, 5, 1061).unwrap();
        assert_eq!(limit.remaining, 4);
    }

    #[test]
    fn test_initiate_ceiling_is_ten_per_minute() {
        let limits = OAuthRateLimits::default();

        for _ in 0..10 {
            limits
                .check(OAuthEndpoint::Initiate, "203.0.113.7", 5000)
                .unwrap();
        }

        match limits.check(OAuthEndpoint::Initiate, "203.0.113.7", 5015) {
            Err(PolicyError::RateLimited {
                endpoint,
                retry_after_seconds,
            }) => {
                assert_eq!(endpoint, OAuthEndpoint::Initiate);
                assert_eq!(retry_after_seconds, 45);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_callback_has_higher_ceiling() {
        let limits = OAuthRateLimits::default();

        for _ in 0..20 {
            limits
                .check(OAuthEndpoint::Callback, "203.0.113.7", 5000)
                .unwrap();
        }
        assert!(limits
            .check(OAuthEndpoint::Callback, "203.0.113.7", 5000)
            .is_err());
    }

    #[test]
    fn test_endpoints_and_clients_are_independent() {
        let limits = OAuthRateLimits::new(RateLimitConfig {
            initiate: RateLimitRule::per_minute(1),
            callback: RateLimitRule::per_minute(1),
            credentials: RateLimitRule::per_minute(1),
        });

        assert!(limits.check(OAuthEndpoint::Initiate, "a", 0).is_ok());
        assert!(limits.check(OAuthEndpoint::Initiate, "a", 0).is_err());
        assert!(limits.check(OAuthEndpoint::Callback, "a", 0).is_ok());
        assert!(limits.check(OAuthEndpoint::Initiate, "b", 0).is_ok());
    }

    #[test]
    fn test_credentials_ceiling_is_five_per_minute() {
        let limits = OAuthRateLimits::default();

        for _ in 0..5 {
            limits
                .check(OAuthEndpoint::Credentials, "203.0.113.7", 5000)
                .unwrap();
        }
        assert!(limits
            .check(OAuthEndpoint::Credentials, "203.0.113.7", 5000)
            .is_err());
    }

    #[test]
    fn test_entries_are_bounded() {
        let limiter = RateLimiter::new();
        for i in 0..(MAX_ENTRIES + 50) {
            let _ = limiter.check(&format!("client-{}", i), 60, 5, i as u64);
        }
        assert!(limiter.len() <= MAX_ENTRIES);
    }

    #[test]
    fn test_prune_keeps_recent_keys_and_leaves_headroom() {
        let limiter = RateLimiter::new();
        // One long window so nothing expires and eviction has to choose
        for i in 0..=MAX_ENTRIES {
            let _ = limiter.check(&format!("client-{}", i), 1_000_000, 5, i as u64);
        }
        assert_eq!(limiter.len(), PRUNE_TARGET);

        // The newest keys survived with their counts
        let limit = limiter
            .check(&format!("client-{}", MAX_ENTRIES), 1_000_000, 5, 20_000)
            .unwrap();
        assert_eq!(limit.remaining, 3);

        // The oldest were evicted and start over
        let limit = limiter.check("client-0", 1_000_000, 5, 20_000).unwrap();
        assert_eq!(limit.remaining, 4);

        // Further new keys do not trigger another pass until the table is full again
        for i in 0..(MAX_ENTRIES - PRUNE_TARGET - 1) {
            let _ = limiter.check(&format!("late-{}", i), 1_000_000, 5, 30_000);
        }
        assert_eq!(limiter.len(), MAX_ENTRIES);
    }
}
