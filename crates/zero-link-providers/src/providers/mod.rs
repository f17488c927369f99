//! Identity provider adapters.
//!
//! Each supported provider implements [`IdentityProvider`] once; the
//! [`ProviderRegistry`](crate::registry::ProviderRegistry) maps keys to
//! trait objects.

pub mod epic;
pub mod github;
pub mod google;
pub mod x;

pub use epic::EpicGamesProvider;
pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use x::XProvider;

use crate::config::ProviderConfig;
use crate::errors::Result;
use crate::types::{ProviderProfile, ProviderTokens};
use async_trait::async_trait;
use serde_json::Value;

/// Protocol surface of one OAuth 2.0 identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Static configuration
    fn config(&self) -> &ProviderConfig;

    /// Registry key
    fn key(&self) -> &str {
        &self.config().key
    }

    /// Authorization URL carrying `state` and the `S256` PKCE challenge
    fn build_auth_url(&self, state: &str, code_challenge: &str) -> Result<String>;

    /// Exchange an authorization code, presenting the PKCE verifier
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<ProviderTokens>;

    /// Fetch and normalize the user's profile
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile>;

    /// Redeem a refresh token for new tokens
    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens>;
}

/// String field, ignoring empty values
pub(crate) fn json_str(value: &Value, field: &str) -> Option<String> {
    value[field]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Identifier that some providers send as a number and others as a string
pub(crate) fn json_id(value: &Value, field: &str) -> Option<String> {
    match &value[field] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Boolean that may arrive as `true` or `"true"`; anything else is `false`
pub(crate) fn json_flag(value: &Value, field: &str) -> bool {
    match &value[field] {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
