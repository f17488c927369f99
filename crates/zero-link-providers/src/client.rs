//! Shared OAuth 2.0 HTTP client.

use crate::config::{ClientAuthMethod, ProviderConfig};
use crate::errors::*;
use crate::types::{ProviderTokens, TokenEndpointResponse};
use reqwest::{header::ACCEPT, Client, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Longest provider error body kept in error messages
const MAX_ERROR_BODY: usize = 256;

const USER_AGENT: &str = concat!("zero-link/", env!("CARGO_PKG_VERSION"));

/// Which provider call failed, to pick the error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    TokenExchange,
    Profile,
    Refresh,
}

impl Operation {
    fn rejected(self, message: String) -> ProviderError {
        match self {
            Operation::TokenExchange => ProviderError::TokenExchangeFailed(message),
            Operation::Profile => ProviderError::ProfileFetchFailed(message),
            Operation::Refresh => ProviderError::RefreshRejected(message),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::TokenExchange => "token exchange",
            Operation::Profile => "profile fetch",
            Operation::Refresh => "token refresh",
        })
    }
}

/// HTTP client used by every provider adapter
#[derive(Clone)]
pub struct OAuthHttpClient {
    http_client: Client,
}

impl OAuthHttpClient {
    /// Create a client whose requests are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::ConfigInvalid(format!("HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Build the authorization URL for an authorization-code + PKCE request
    pub fn build_auth_url(
        &self,
        config: &ProviderConfig,
        state: &str,
        code_challenge: &str,
    ) -> Result<String> {
        let mut url = Url::parse(&config.auth_url)
            .map_err(|e| ProviderError::ConfigInvalid(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", &config.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &config.scopes.join(" "))
                .append_pair("state", state)
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "S256");

            for (name, value) in &config.extra_auth_params {
                query.append_pair(name, value);
            }
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code, presenting the PKCE verifier
    pub async fn exchange_code(
        &self,
        config: &ProviderConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderTokens> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];

        self.token_request(config, &params, Operation::TokenExchange)
            .await
    }

    /// Redeem a refresh token
    pub async fn refresh(
        &self,
        config: &ProviderConfig,
        refresh_token: &str,
    ) -> Result<ProviderTokens> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.token_request(config, &params, Operation::Refresh).await
    }

    /// GET a JSON resource with the user's access token
    pub async fn get_json(&self, url: &str, access_token: &str) -> Result<serde_json::Value> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(Operation::Profile, e))?;

        let response = check_status(Operation::Profile, response).await?;

        response.json().await.map_err(|e| {
            ProviderError::ProfileFetchFailed(format!("Failed to parse user info: {}", e))
        })
    }

    async fn token_request(
        &self,
        config: &ProviderConfig,
        params: &[(&str, &str)],
        operation: Operation,
    ) -> Result<ProviderTokens> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        let mut request = self
            .http_client
            .post(&config.token_url)
            .header(ACCEPT, "application/json");

        match config.client_auth {
            ClientAuthMethod::RequestBody => {
                form.push(("client_id", config.client_id.as_str()));
                form.push(("client_secret", config.client_secret.as_str()));
            }
            ClientAuthMethod::BasicAuth => {
                request = request.basic_auth(&config.client_id, Some(&config.client_secret));
            }
        }

        let response = request
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let response = check_status(operation, response).await?;

        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| operation.rejected(format!("Failed to parse token response: {}", e)))?;

        // Some providers (GitHub) report errors with a 200 status
        if let Some(error) = body.error {
            let description = body.error_description.unwrap_or_default();
            return Err(operation.rejected(format!("{} {}", error, description).trim().to_string()));
        }

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| operation.rejected("Token response without access_token".to_string()))?;

        debug!(
            provider = %config.key,
            operation = %operation,
            has_refresh_token = body.refresh_token.is_some(),
            expires_in = ?body.expires_in,
            "Token endpoint call succeeded"
        );

        Ok(ProviderTokens {
            access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            token_type: body.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: body.scope,
            expires_in: body.expires_in,
        })
    }
}

impl fmt::Debug for OAuthHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OAuthHttpClient")
    }
}

fn transport_error(operation: Operation, error: reqwest::Error) -> ProviderError {
    warn!(
        operation = %operation,
        timeout = error.is_timeout(),
        connect = error.is_connect(),
        "Provider request did not complete"
    );
    ProviderError::Unavailable(format!("{} request failed: {}", operation, error))
}

async fn check_status(operation: Operation, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::Unavailable(format!(
            "{} failed with status {}",
            operation, status
        )));
    }

    Err(operation.rejected(format!("status {}: {}", status, body)))
}
