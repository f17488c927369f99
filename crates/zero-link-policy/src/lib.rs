//! # zero-link-policy
//!
//! Fixed-window rate limiting for the authorization, callback and password
//! endpoints, keyed by client address.

#![warn(clippy::all)]

pub mod errors;
pub mod rate_limit;
pub mod types;

pub use errors::{PolicyError, Result};
pub use rate_limit::{OAuthRateLimits, RateLimiter};
pub use types::*;
