//! # zero-link-providers
//!
//! Identity provider integration for the zero-link OAuth engine.
//!
//! - [`ProviderRegistry`]: one [`ProviderConfig`] per supported provider,
//!   loaded at startup, with providers lacking credentials disabled
//! - [`IdentityProvider`]: the per-provider protocol surface
//!   (`build_auth_url`, `exchange_code`, `fetch_profile`, `refresh`)
//! - [`OAuthHttpClient`]: the shared HTTP client; every call is bounded
//!   by a timeout and a timeout surfaces as [`ProviderError::Unavailable`]
//!
//! Access and refresh tokens pass through this crate in memory only and are
//! never logged.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod errors;
pub mod providers;
pub mod registry;
pub mod types;

pub use client::OAuthHttpClient;
pub use config::{callback_url, ClientAuthMethod, ProviderConfig};
pub use errors::{ProviderError, Result};
pub use providers::{
    EpicGamesProvider, GitHubProvider, GoogleProvider, IdentityProvider, XProvider,
};
pub use registry::ProviderRegistry;
pub use types::{ProviderProfile, ProviderTokens};
