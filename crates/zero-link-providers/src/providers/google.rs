//! Google OAuth/OIDC provider implementation.

use super::{json_flag, json_str, IdentityProvider};
use crate::client::OAuthHttpClient;
use crate::config::{ClientAuthMethod, ProviderConfig};
use crate::errors::*;
use crate::types::{ProviderProfile, ProviderTokens};
use async_trait::async_trait;
use serde_json::Value;

/// Google OAuth/OIDC provider
///
/// Profile comes from the OIDC userinfo endpoint, which reports
/// `email_verified`. Offline access is requested so Google issues a
/// refresh token.
pub struct GoogleProvider {
    config: ProviderConfig,
    client: OAuthHttpClient,
}

impl GoogleProvider {
    /// Registry key
    pub const KEY: &'static str = "google";

    /// Production endpoints and scopes
    pub fn default_config(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> ProviderConfig {
        ProviderConfig {
            key: Self::KEY.to_string(),
            display_name: "Google".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            user_info_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            client_id,
            client_secret,
            redirect_uri,
            enabled: true,
            client_auth: ClientAuthMethod::RequestBody,
            extra_auth_params: vec![
                ("access_type".to_string(), "offline".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ],
        }
    }

    /// Create the adapter
    pub fn new(config: ProviderConfig, client: OAuthHttpClient) -> Self {
        Self { config, client }
    }

    pub(crate) fn parse_profile(json: &Value) -> Result<ProviderProfile> {
        let subject = json_str(json, "sub")
            .ok_or_else(|| ProviderError::ProfileFetchFailed("Missing sub".to_string()))?;

        Ok(ProviderProfile {
            subject,
            email: json_str(json, "email"),
            email_verified: json_flag(json, "email_verified"),
            display_name: json_str(json, "name"),
            avatar_url: json_str(json, "picture"),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
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
