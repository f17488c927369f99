use anyhow::{Context, Result};
use std::sync::Arc;
use zero_link_auth::{EngineConfig, OAuthService, TracingAuditLog};
use zero_link_crypto::TokenCipher;
use zero_link_providers::{OAuthHttpClient, ProviderRegistry};
use zero_link_storage::RocksDbStorage;

use crate::config::Config;
use crate::stores::{RocksSessionManager, RocksUserStore};

pub type Engine = OAuthService<RocksDbStorage, RocksUserStore, RocksSessionManager>;

/// Application state shared across all handlers
pub struct AppState {
    pub config: Config,
    pub oauth: Arc<Engine>,
    pub users: Arc<RocksUserStore>,
    pub sessions: Arc<RocksSessionManager>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let storage = Arc::new(
            RocksDbStorage::open(&config.database_path).context("failed to open database")?,
        );

        let client = OAuthHttpClient::new(config.provider_http_timeout)?;
        let registry = ProviderRegistry::from_env(&config.public_base_url, client);
        for provider in registry.list_enabled() {
            tracing::info!(provider = %provider.key, "OAuth provider enabled");
        }

        Self::with_registry(config, storage, registry)
    }

    /// Build the state around an already opened database and provider registry
    pub fn with_registry(
        config: Config,
        storage: Arc<RocksDbStorage>,
        registry: ProviderRegistry,
    ) -> Result<Self> {
        let cipher = TokenCipher::from_hex(config.token_encryption_key.trim())
            .context("TOKEN_ENCRYPTION_KEY is not valid hex")?;

        let users = Arc::new(RocksUserStore::new(Arc::clone(&storage)));
        let sessions = Arc::new(RocksSessionManager::new(
            Arc::clone(&storage),
            config.session_ttl,
        ));

        let engine_config = EngineConfig {
            rate_limits: config.rate_limits,
            ..EngineConfig::default()
        };

        let oauth = Arc::new(OAuthService::new(
            storage,
            Arc::new(registry),
            Arc::new(cipher),
            Arc::clone(&users),
            Arc::clone(&sessions),
            Arc::new(TracingAuditLog),
            engine_config,
        ));

        Ok(AppState {
            config,
            oauth,
            users,
            sessions,
        })
    }
}
