//! Rate limit types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of an allowed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Window length in seconds
    pub window_seconds: u64,
    /// Attempts allowed per window
    pub max_attempts: u32,
    /// Attempts left in the current window
    pub remaining: u32,
    /// Unix timestamp at which the window resets
    pub reset_at: u64,
}

/// Ceiling for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Window length in seconds
    pub window_seconds: u64,
    /// Attempts allowed per window
    pub max_attempts: u32,
}

impl RateLimitRule {
    /// `max_attempts` per minute
    pub const fn per_minute(max_attempts: u32) -> Self {
        Self {
            window_seconds: 60,
            max_attempts,
        }
    }
}

/// Endpoints guarded by the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthEndpoint {
    /// Authorization initiation (login and link)
    Initiate,
    /// Provider callback
    Callback,
    /// Password checks (manual-link confirmation, password changes)
    Credentials,
}

impl OAuthEndpoint {
    /// Stable name used in limiter keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthEndpoint::Initiate => "initiate",
            OAuthEndpoint::Callback => "callback",
            OAuthEndpoint::Credentials => "credentials",
        }
    }
}

impl fmt::Display for OAuthEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-endpoint ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Initiation ceiling (default 10/min)
    pub initiate: RateLimitRule,
    /// Callback ceiling (default 20/min); higher since providers drive it
    pub callback: RateLimitRule,
    /// Password check ceiling (default 5/min)
    pub credentials: RateLimitRule,
}

impl RateLimitConfig {
    /// Rule for an endpoint
    pub fn rule(&self, endpoint: OAuthEndpoint) -> RateLimitRule {
        match endpoint {
            OAuthEndpoint::Initiate => self.initiate,
            OAuthEndpoint::Callback => self.callback,
            OAuthEndpoint::Credentials => self.credentials,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            initiate: RateLimitRule::per_minute(10),
            callback: RateLimitRule::per_minute(20),
            credentials: RateLimitRule::per_minute(5),
        }
    }
}
