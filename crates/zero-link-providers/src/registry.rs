//! Provider registry.

use crate::client::OAuthHttpClient;
use crate::config::{callback_url, ProviderConfig};
use crate::errors::*;
use crate::providers::{
    EpicGamesProvider, GitHubProvider, GoogleProvider, IdentityProvider, XProvider,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Providers known to the registry: (key, environment variable prefix)
const KNOWN_PROVIDERS: [(&str, &str); 4] = [
    (GoogleProvider::KEY, "GOOGLE"),
    (GitHubProvider::KEY, "GITHUB"),
    (XProvider::KEY, "X"),
    (EpicGamesProvider::KEY, "EPIC"),
];

struct Registration {
    config: ProviderConfig,
    provider: Option<Arc<dyn IdentityProvider>>,
}

/// Registry of configured providers, built once at startup
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Registration>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enabled provider adapter
    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        let config = provider.config().clone();
        self.providers.insert(
            config.key.clone(),
            Registration {
                config,
                provider: Some(provider),
            },
        );
    }

    /// Register a provider that is known but may not be used
    pub fn register_disabled(&mut self, mut config: ProviderConfig) {
        config.enabled = false;
        self.providers.insert(
            config.key.clone(),
            Registration {
                config,
                provider: None,
            },
        );
    }

    /// Load every known provider from the process environment
    ///
    /// For prefix `P`: `P_CLIENT_ID`, `P_CLIENT_SECRET`, optional `P_ENABLED`.
    pub fn from_env(base_url: &str, client: OAuthHttpClient) -> Self {
        Self::from_lookup(base_url, client, |name| std::env::var(name).ok())
    }

    /// Load every known provider from an arbitrary variable lookup
    pub fn from_lookup<F>(base_url: &str, client: OAuthHttpClient, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = Self::new();

        for (key, prefix) in KNOWN_PROVIDERS {
            let client_id = lookup(&format!("{}_CLIENT_ID", prefix)).unwrap_or_default();
            let client_secret = lookup(&format!("{}_CLIENT_SECRET", prefix)).unwrap_or_default();
            let switched_on = lookup(&format!("{}_ENABLED", prefix))
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true);
            let redirect_uri = callback_url(base_url, key);

            let config = match key {
                GoogleProvider::KEY => {
                    GoogleProvider::default_config(client_id, client_secret, redirect_uri)
                }
                GitHubProvider::KEY => {
                    GitHubProvider::default_config(client_id, client_secret, redirect_uri)
                }
                XProvider::KEY => XProvider::default_config(client_id, client_secret, redirect_uri),
                _ => EpicGamesProvider::default_config(client_id, client_secret, redirect_uri),
            };

            if !config.has_credentials() {
                info!(provider = key, "Provider disabled: missing client credentials");
                registry.register_disabled(config);
                continue;
            }
            if !switched_on {
                info!(provider = key, "Provider disabled by configuration");
                registry.register_disabled(config);
                continue;
            }

            let provider: Arc<dyn IdentityProvider> = match key {
                GoogleProvider::KEY => Arc::new(GoogleProvider::new(config, client.clone())),
                GitHubProvider::KEY => Arc::new(GitHubProvider::new(config, client.clone())),
                XProvider::KEY => Arc::new(XProvider::new(config, client.clone())),
                _ => Arc::new(EpicGamesProvider::new(config, client.clone())),
            };
            info!(provider = key, "Provider enabled");
            registry.register(provider);
        }

        registry
    }

    /// Configuration of a provider, enabled or not
    pub fn get(&self, key: &str) -> Result<&ProviderConfig> {
        self.providers
            .get(key)
            .map(|r| &r.config)
            .ok_or_else(|| ProviderError::UnknownProvider(key.to_string()))
    }

    /// Adapter of an enabled provider
    pub fn provider(&self, key: &str) -> Result<Arc<dyn IdentityProvider>> {
        let registration = self
            .providers
            .get(key)
            .ok_or_else(|| ProviderError::UnknownProvider(key.to_string()))?;

        match (&registration.provider, registration.config.enabled) {
            (Some(provider), true) => Ok(Arc::clone(provider)),
            _ => {
                warn!(provider = key, "Flow requested against disabled provider");
                Err(ProviderError::ProviderDisabled(key.to_string()))
            }
        }
    }

    /// Enabled providers, ordered by key
    pub fn list_enabled(&self) -> Vec<&ProviderConfig> {
        self.providers
            .values()
            .filter(|r| r.config.enabled && r.provider.is_some())
            .map(|r| &r.config)
            .collect()
    }
}
