//! X (Twitter) OAuth provider implementation.

use super::{json_str, IdentityProvider};
use crate::client::OAuthHttpClient;
use crate::config::{ClientAuthMethod, ProviderConfig};
use crate::errors::*;
use crate::types::{ProviderProfile, ProviderTokens};
use async_trait::async_trait;
use serde_json::Value;

/// X (Twitter) OAuth provider
///
/// X uses OAuth 2.0 with mandatory PKCE but does not support OIDC and never
/// exposes an email address. Confidential clients authenticate with HTTP
/// Basic at the token endpoint.
pub struct XProvider {
    config: ProviderConfig,
    client: OAuthHttpClient,
}

impl XProvider {
    /// Registry key
    pub const KEY: &'static str = "x";

    /// Production endpoints and scopes
    pub fn default_config(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> ProviderConfig {
        ProviderConfig {
            key: Self::KEY.to_string(),
            display_name: "X".to_string(),
            auth_url: "https://twitter.com/i/oauth2/authorize".to_string(),
            token_url: "https://api.twitter.com/2/oauth2/token".to_string(),
            user_info_url: "https://api.twitter.com/2/users/me?user.fields=profile_image_url"
                .to_string(),
            scopes: vec![
                "tweet.read".to_string(),
                "users.read".to_string(),
                "offline.access".to_string(),
            ],
            client_id,
            client_secret,
            redirect_uri,
            enabled: true,
            client_auth: ClientAuthMethod::BasicAuth,
            extra_auth_params: Vec::new(),
        }
    }

    /// Create the adapter
    pub fn new(config: ProviderConfig, client: OAuthHttpClient) -> Self {
        Self { config, client }
    }

    pub(crate) fn parse_profile(json: &Value) -> Result<ProviderProfile> {
        let data = &json["data"];
        let subject = json_str(data, "id")
            .ok_or_else(|| ProviderError::ProfileFetchFailed("Missing data.id".to_string()))?;

        Ok(ProviderProfile {
            subject,
            email: None,
            email_verified: false,
            display_name: json_str(data, "name").or_else(|| json_str(data, "username")),
            avatar_url: json_str(data, "profile_image_url"),
        })
    }
}

#[async_trait]
impl IdentityProvider for XProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_auth_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        self.client.build_auth_url(&self.config, state, code_challenge)
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<ProviderTokens> {
        self.client
            .exchange_code(&self.config, code, code_verifier)
            .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile> {
        let json = self
            .client
            .get_json(&self.config.user_info_url, access_token)
            .await?;
        Self::parse_profile(&json)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens> {
        self.client.refresh(&self.config, refresh_token).await
    }
}
