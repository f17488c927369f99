//! GitHub OAuth provider implementation.

use super::{json_id, json_str, IdentityProvider};
use crate::client::OAuthHttpClient;
use crate::config::{ClientAuthMethod, ProviderConfig};
use crate::errors::*;
use crate::types::{ProviderProfile, ProviderTokens};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// GitHub OAuth provider
///
/// GitHub is plain OAuth 2.0. `/user` only carries the public email and never
/// says whether it is verified, so the primary verified address is read from
/// `/user/emails` instead.
pub struct GitHubProvider {
    config: ProviderConfig,
    client: OAuthHttpClient,
}

impl GitHubProvider {
    /// Registry key
    pub const KEY: &'static str = "github";

    /// Production endpoints and scopes
    pub fn default_config(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> ProviderConfig {
        ProviderConfig {
            key: Self::KEY.to_string(),
            display_name: "GitHub".to_string(),
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            user_info_url: "https://api.github.com/user".to_string(),
            scopes: vec!["read:user".to_string(), "user:email".to_string()],
            client_id,
            client_secret,
            redirect_uri,
            enabled: true,
            client_auth: ClientAuthMethod::RequestBody,
            extra_auth_params: Vec::new(),
        }
    }

    /// Create the adapter
    pub fn new(config: ProviderConfig, client: OAuthHttpClient) -> Self {
        Self { config, client }
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.config.user_info_url.trim_end_matches('/'))
    }

    pub(crate) fn parse_profile(user: &Value, emails: Option<&Value>) -> Result<ProviderProfile> {
        let subject = json_id(user, "id")
            .ok_or_else(|| ProviderError::ProfileFetchFailed("Missing id".to_string()))?;

        let primary = emails
            .and_then(|v| v.as_array())
            .and_then(|list| {
                list.iter()
                    .find(|e| e["primary"].as_bool() == Some(true))
                    .or_else(|| list.iter().find(|e| e["verified"].as_bool() == Some(true)))
            });

        let (email, email_verified) = match primary {
            Some(entry) => (
                json_str(entry, "email"),
                entry["verified"].as_bool().unwrap_or(false),
            ),
            None => (json_str(user, "email"), false),
        };

        Ok(ProviderProfile {
            subject,
            email,
            email_verified,
            display_name: json_str(user, "name").or_else(|| json_str(user, "login")),
            avatar_url: json_str(user, "avatar_url"),
        })
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
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
        let user = self
            .client
            .get_json(&self.config.user_info_url, access_token)
            .await?;

        // Without the user:email grant the list is forbidden; fall back to /user
        let emails = match self.client.get_json(&self.emails_url(), access_token).await {
            Ok(emails) => Some(emails),
            Err(ProviderError::ProfileFetchFailed(reason)) => {
                debug!(reason = %reason, "GitHub email list unavailable");
                None
            }
            Err(e) => return Err(e),
        };

        Self::parse_profile(&user, emails.as_ref())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens> {
        self.client.refresh(&self.config, refresh_token).await
    }
}
