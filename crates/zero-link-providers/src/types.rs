//! Provider protocol types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens issued by a provider's token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    /// Access token
    pub access_token: String,
    /// Refresh token, if the provider issued one
    pub refresh_token: Option<String>,
    /// Token type (normally `Bearer`)
    pub token_type: String,
    /// Granted scope string, if reported
    pub scope: Option<String>,
    /// Access token lifetime in seconds, if reported
    pub expires_in: Option<u64>,
}

impl ProviderTokens {
    /// Absolute expiry given the time the tokens were received
    pub fn expires_at(&self, received_at: u64) -> Option<u64> {
        self.expires_in.map(|secs| received_at.saturating_add(secs))
    }
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Raw token endpoint response (RFC 6749 § 5.1 / § 5.2)
#[derive(Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Normalized user profile returned by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Provider-assigned, stable subject id
    pub subject: String,
    /// Email as reported by the provider
    pub email: Option<String>,
    /// Whether the provider attests the email. Missing means `false`.
    pub email_verified: bool,
    /// Display name
    pub display_name: Option<String>,
    /// Avatar URL
    pub avatar_url: Option<String>,
}
