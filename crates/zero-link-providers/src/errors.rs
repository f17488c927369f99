//! Provider error types.

use thiserror::Error;

/// Errors raised while talking to, or looking up, an identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No provider is registered under this key
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider is registered but disabled (missing credentials or switched off)
    #[error("Provider disabled: {0}")]
    ProviderDisabled(String),

    /// Token endpoint rejected the authorization code
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// User-info endpoint rejected the request or returned an unusable profile
    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    /// Token endpoint rejected the refresh token
    #[error("Refresh rejected: {0}")]
    RefreshRejected(String),

    /// Timeout, connection failure or provider-side 5xx
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider configuration is unusable (e.g. malformed endpoint URL)
    #[error("Invalid provider configuration: {0}")]
    ConfigInvalid(String),
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
