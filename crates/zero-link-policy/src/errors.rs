//! Policy error types.

use crate::types::OAuthEndpoint;
use thiserror::Error;

/// Policy errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Too many attempts in the current window
    #[error("Rate limit exceeded for {endpoint}; retry after {retry_after_seconds}s")]
    RateLimited {
        /// Endpoint whose ceiling was hit
        endpoint: OAuthEndpoint,
        /// Seconds until the window resets
        retry_after_seconds: u64,
    },
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
