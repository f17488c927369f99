//! Epic Games OAuth provider implementation.

use super::{json_str, IdentityProvider};
use crate::client::OAuthHttpClient;
use crate::config::{ClientAuthMethod, ProviderConfig};
use crate::errors::*;
use crate::types::{ProviderProfile, ProviderTokens};
use async_trait::async_trait;
use serde_json::Value;

/// Epic Games OAuth provider
///
/// Epic Account Services identify users by account id; no email is shared
/// with third parties.
pub struct EpicGamesProvider {
    config: ProviderConfig,
    client: OAuthHttpClient,
}

impl EpicGamesProvider {
    /// Registry key
    pub const KEY: &'static str = "epic";

    /// Production endpoints and scopes
    pub fn default_config(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> ProviderConfig {
        ProviderConfig {
            key: Self::KEY.to_string(),
            display_name: "Epic Games".to_string(),
            auth_url: "https://www.epicgames.com/id/authorize".to_string(),
            token_url: "https://api.epicgames.dev/epic/oauth/v2/token".to_string(),
            user_info_url: "https://api.epicgames.dev/epic/oauth/v2/userInfo".to_string(),
            scopes: vec!["basic_profile".to_string(), "openid".to_string()],
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
        let subject = json_str(json, "sub")
            .or_else(|| json_str(json, "account_id"))
            .ok_or_else(|| ProviderError::ProfileFetchFailed("Missing sub".to_string()))?;

        Ok(ProviderProfile {
            subject,
            email: None,
            email_verified: false,
            display_name: json_str(json, "preferred_username"),
            avatar_url: None,
        })
    }
}

#[async_trait]
impl IdentityProvider for EpicGamesProvider {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epic_config() {
        let config =
            EpicGamesProvider::default_config("id".into(), "secret".into(), "http://cb".into());

        assert_eq!(config.key, "epic");
        assert!(config.auth_url.contains("epicgames"));
        assert_eq!(config.scopes[0], "basic_profile");
    }

    #[test]
    fn test_parse_profile() {
        let profile = EpicGamesProvider::parse_profile(&json!({
            "sub": "c3e3f4a2b1",
            "preferred_username": "Jinx"
        }))
        .unwrap();

        assert_eq!(profile.subject, "c3e3f4a2b1");
        assert_eq!(profile.display_name.as_deref(), Some("Jinx"));
        assert_eq!(profile.email, None);
    }

    #[test]
    fn test_account_id_fallback() {
        let profile =
            EpicGamesProvider::parse_profile(&json!({"account_id": "acc-1"})).unwrap();
        assert_eq!(profile.subject, "acc-1");
    }
}
