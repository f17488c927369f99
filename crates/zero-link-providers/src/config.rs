//! OAuth provider configuration.

use std::fmt;

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// `client_id` and `client_secret` in the form body
    RequestBody,
    /// HTTP Basic with `client_id:client_secret`
    BasicAuth,
}

/// Static configuration for one provider, immutable after load
#[derive(Clone)]
pub struct ProviderConfig {
    /// Registry key (e.g. "google")
    pub key: String,
    /// Human readable name
    pub display_name: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// User info endpoint
    pub user_info_url: String,
    /// Scopes to request, in order
    pub scopes: Vec<String>,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Callback URL registered with the provider
    pub redirect_uri: String,
    /// Whether flows may be started against this provider
    pub enabled: bool,
    /// Token endpoint client authentication
    pub client_auth: ClientAuthMethod,
    /// Additional authorization request parameters
    pub extra_auth_params: Vec<(String, String)>,
}

impl ProviderConfig {
    /// Whether both client credentials are present
    pub fn has_credentials(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("key", &self.key)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("user_info_url", &self.user_info_url)
            .field("scopes", &self.scopes)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Callback URL for a provider, derived from the configured public base URL
pub fn callback_url(base_url: &str, provider_key: &str) -> String {
    format!(
        "{}/auth/oauth/{}/callback",
        base_url.trim_end_matches('/'),
        provider_key
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(client_id: &str, client_secret: &str) -> ProviderConfig {
        ProviderConfig {
            key: "google".to_string(),
            display_name: "Google".to_string(),
            auth_url: "https://accounts.example/auth".to_string(),
            token_url: "https://accounts.example/token".to_string(),
            user_info_url: "https://accounts.example/userinfo".to_string(),
            scopes: vec!["openid".to_string()],
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: callback_url("https://app.example", "google"),
            enabled: true,
            client_auth: ClientAuthMethod::RequestBody,
            extra_auth_params: Vec::new(),
        }
    }

    #[test]
    fn test_callback_url_strips_trailing_slash() {
        assert_eq!(
            callback_url("https://app.example/", "github"),
            "https://app.example/auth/oauth/github/callback"
        );
    }

    #[test]
    fn test_has_credentials() {
        assert!(config("id", "secret").has_credentials());
        assert!(!config("id", " ").has_credentials());
        assert!(!config("", "secret").has_credentials());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", config("id", "super-secret-value"));
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
