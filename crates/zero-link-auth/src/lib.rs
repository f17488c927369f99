//! # zero-link-auth
//!
//! OAuth 2.0 authorization-code flow with PKCE, account linking and
//! provider token lifecycle.
//!
//! - Initiation persists a single-use [`PendingAuthorization`] keyed by the
//!   state token and returns the provider URL
//! - The callback consumes that record atomically, exchanges the code,
//!   fetches the profile and lets the [`AccountLinker`] decide between
//!   sign-in, auto-link on a verified email, manual link, or a new user
//! - Provider tokens are stored encrypted per identity and refreshed lazily
//!   (5 minute margin) or by a periodic sweep, one refresh per identity at a time
//!
//! Local users, sessions and the audit trail are reached only through the
//! [`UserStore`], [`SessionManager`] and [`AuditLog`] traits.

#![warn(missing_docs)]

pub mod audit;
pub mod errors;
pub mod identities;
pub mod linker;
pub mod locks;
pub mod pending;
mod service;
pub mod tokens;
pub mod traits;
pub mod types;


pub use audit::{AuditEvent, TracingAuditLog};
pub use errors::{OAuthError, Result};
pub use linker::{AccountLinker, LinkOutcome};
pub use service::{
    EngineConfig, OAuthService, MANUAL_LINK_TTL, PENDING_AUTHORIZATION_TTL,
    REFRESH_SAFETY_MARGIN, SWEEP_HORIZON,
};
pub use traits::*;
pub use types::*;
pub use zero_link_crypto::current_timestamp;
