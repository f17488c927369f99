//! OAuth engine service.

mod callback;
mod initiate;
mod lifecycle;

use crate::{
    audit::AuditEvent,
    errors::Result,
    identities::IdentityStore,
    linker::AccountLinker,
    locks::KeyedLocks,
    pending::PendingStore,
    tokens::{TokenRefresher, TokenStore},
    traits::{AuditLog, OAuthFlows, SessionManager, UserStore},
    types::*,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;
use zero_link_crypto::{current_timestamp, TokenCipher};
use zero_link_policy::{OAuthRateLimits, RateLimitConfig};
use zero_link_providers::ProviderRegistry;
use zero_link_storage::Storage;

/// Lifetime of a pending authorization (10 minutes)
pub const PENDING_AUTHORIZATION_TTL: u64 = 600;

/// Lifetime of a manual-link ticket (10 minutes)
pub const MANUAL_LINK_TTL: u64 = 600;

/// Refresh access tokens expiring within this many seconds (5 minutes)
pub const REFRESH_SAFETY_MARGIN: u64 = 300;

/// Background sweep looks this far ahead (2 hours)
pub const SWEEP_HORIZON: u64 = 7200;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pending authorization lifetime in seconds
    pub pending_ttl: u64,
    /// Manual-link ticket lifetime in seconds
    pub manual_link_ttl: u64,
    /// Lazy refresh safety margin in seconds
    pub refresh_margin: u64,
    /// Sweep look-ahead in seconds
    pub sweep_horizon: u64,
    /// Per-endpoint rate limits
    pub rate_limits: RateLimitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pending_ttl: PENDING_AUTHORIZATION_TTL,
            manual_link_ttl: MANUAL_LINK_TTL,
            refresh_margin: REFRESH_SAFETY_MARGIN,
            sweep_horizon: SWEEP_HORIZON,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

/// OAuth engine: authorization flows, account linking and token lifecycle
pub struct OAuthService<S, U, M>
where
    S: Storage,
    U: UserStore,
    M: SessionManager,
{
    registry: Arc<ProviderRegistry>,
    pending: Arc<PendingStore<S>>,
    identities: Arc<IdentityStore<S>>,
    refresher: TokenRefresher<S>,
    linker: AccountLinker<S, U>,
    sessions: Arc<M>,
    audit: Arc<dyn AuditLog>,
    rate_limits: OAuthRateLimits,
    config: EngineConfig,
}

impl<S, U, M> OAuthService<S, U, M>
where
    S: Storage + 'static,
    U: UserStore,
    M: SessionManager,
{
    /// Create a new OAuth engine
    pub fn new(
        storage: Arc<S>,
        registry: Arc<ProviderRegistry>,
        cipher: Arc<TokenCipher>,
        users: Arc<U>,
        sessions: Arc<M>,
        audit: Arc<dyn AuditLog>,
        config: EngineConfig,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let pending = Arc::new(PendingStore::new(Arc::clone(&storage)));
        let identities = Arc::new(IdentityStore::new(Arc::clone(&storage)));
        let tokens = Arc::new(TokenStore::new(Arc::clone(&storage), cipher));

        let refresher = TokenRefresher::new(
            Arc::clone(&tokens),
            Arc::clone(&identities),
            Arc::clone(&registry),
            Arc::clone(&locks),
            config.refresh_margin,
            config.sweep_horizon,
        );
        let linker = AccountLinker::new(
            storage,
            Arc::clone(&identities),
            tokens,
            Arc::clone(&pending),
            users,
            locks,
            config.manual_link_ttl,
        );

        Self {
            registry,
            pending,
            identities,
            refresher,
            linker,
            sessions,
            audit,
            rate_limits: OAuthRateLimits::new(config.rate_limits),
            config,
        }
    }

    /// Provider registry in use
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Engine tunables in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn audit(&self, event: AuditEvent) {
        self.audit.record(event).await;
    }
}

#[async_trait]
impl<S, U, M> OAuthFlows for OAuthService<S, U, M>
where
    S: Storage + 'static,
    U: UserStore,
    M: SessionManager,
{
    async fn initiate(&self, request: InitiateRequest) -> Result<AuthorizationRedirect> {
        self.initiate_at(request, current_timestamp()).await
    }

    async fn handle_callback(&self, request: CallbackRequest) -> Result<CallbackOutcome> {
        self.handle_callback_at(request, current_timestamp()).await
    }

    async fn complete_manual_link(&self, ticket: &str, user_id: Uuid) -> Result<CallbackOutcome> {
        self.complete_manual_link_at(ticket, user_id, current_timestamp())
            .await
    }

    async fn manual_link_email(&self, ticket: &str) -> Result<String> {
        self.manual_link_email_at(ticket, current_timestamp()).await
    }

    async fn throttle_credentials(&self, client_addr: &str) -> Result<()> {
        self.throttle_credentials_at(client_addr, current_timestamp())
            .await
    }

    async fn unlink(&self, user_id: Uuid, provider: &str) -> Result<Vec<LinkedIdentity>> {
        self.unlink_provider(user_id, provider).await
    }

    async fn list_identities(&self, user_id: Uuid) -> Result<Vec<LinkedIdentity>> {
        self.identities.list_for_user(user_id).await
    }

    async fn get_valid_access_token(&self, identity_id: Uuid) -> Result<AccessToken> {
        self.get_valid_access_token_at(identity_id, current_timestamp())
            .await
    }

    async fn sweep_expiring_tokens(&self) -> Result<SweepReport> {
        self.sweep_expiring_tokens_at(current_timestamp()).await
    }

    async fn purge_expired_pending(&self) -> Result<usize> {
        self.purge_expired_pending_at(current_timestamp()).await
    }
}
