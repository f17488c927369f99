//! Lazy and background token refresh.

use super::TokenStore;
use crate::{
    errors::{OAuthError, Result},
    identities::IdentityStore,
    locks::{identity_key, KeyedLocks},
    types::{AccessToken, LinkedIdentity, StoredToken, SweepReport},
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zero_link_providers::{ProviderError, ProviderRegistry};
use zero_link_storage::Storage;

enum Swept {
    Refreshed,
    Skipped,
}

/// Refreshes provider tokens on use and in periodic sweeps.
///
/// All refreshes of one identity run under that identity's lock, and the
/// token is re-read after the lock is taken: a caller that waited behind an
/// in-flight refresh picks up its result instead of presenting the same
/// refresh token a second time.
pub struct TokenRefresher<S: Storage> {
    tokens: Arc<TokenStore<S>>,
    identities: Arc<IdentityStore<S>>,
    registry: Arc<ProviderRegistry>,
    locks: Arc<KeyedLocks>,
    safety_margin: u64,
    sweep_horizon: u64,
}

impl<S: Storage> TokenRefresher<S> {
    /// Create a refresher
    pub fn new(
        tokens: Arc<TokenStore<S>>,
        identities: Arc<IdentityStore<S>>,
        registry: Arc<ProviderRegistry>,
        locks: Arc<KeyedLocks>,
        safety_margin: u64,
        sweep_horizon: u64,
    ) -> Self {
        Self {
            tokens,
            identities,
            registry,
            locks,
            safety_margin,
            sweep_horizon,
        }
    }

    /// Return a usable access token, refreshing first if it expires within the safety margin
    pub async fn get_valid_access_token(
        &self,
        identity_id: Uuid,
        current_time: u64,
    ) -> Result<AccessToken> {
        let identity = self.identities.require(identity_id).await?;
        if identity.reauth_required {
            return Err(OAuthError::ReauthenticationRequired(identity_id));
        }

        let token = self.load(identity_id).await?;
        if !token.expires_within(self.safety_margin, current_time) {
            return self.open(&token).await;
        }

        let _guard = self.locks.lock(&identity_key(&identity_id)).await;

        // A refresh rejected while we waited leaves the identity flagged
        let identity = self.identities.require(identity_id).await?;
        if identity.reauth_required {
            return Err(OAuthError::ReauthenticationRequired(identity_id));
        }

        let token = self.load(identity_id).await?;
        if !token.expires_within(self.safety_margin, current_time) {
            debug!(%identity_id, "Token refreshed by a concurrent caller");
            return self.open(&token).await;
        }

        let refreshed = self.refresh_locked(&identity, token, current_time).await?;
        self.open(&refreshed).await
    }

    /// Refresh every token that expires within the sweep horizon.
    ///
    /// Failures are logged per identity and counted; they never abort the sweep.
    pub async fn sweep(&self, current_time: u64) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for token in self.tokens.load_all().await? {
            report.scanned += 1;
            let identity_id = token.identity_id;

            if !self.due_for_sweep(&token, current_time) {
                report.skipped += 1;
                continue;
            }

            match self.sweep_one(identity_id, current_time).await {
                Ok(Swept::Refreshed) => report.refreshed += 1,
                Ok(Swept::Skipped) => report.skipped += 1,
                Err(error) => {
                    warn!(%identity_id, error = %error, "Background token refresh failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            "Token sweep complete"
        );
        Ok(report)
    }

    /// Sweep a single identity under its lock, re-reading both records there
    async fn sweep_one(&self, identity_id: Uuid, current_time: u64) -> Result<Swept> {
        let _guard = self.locks.lock(&identity_key(&identity_id)).await;

        let identity = match self.identities.get(identity_id).await? {
            Some(identity) if !identity.reauth_required => identity,
            Some(_) => return Ok(Swept::Skipped),
            None => {
                warn!(%identity_id, "Stored token without a linked identity");
                return Ok(Swept::Skipped);
            }
        };

        let token = match self.tokens.load(identity_id).await? {
            Some(token) if self.due_for_sweep(&token, current_time) => token,
            _ => return Ok(Swept::Skipped),
        };

        self.refresh_locked(&identity, token, current_time).await?;
        Ok(Swept::Refreshed)
    }

    /// A token is due once it expires within the horizon and has used half its lifetime
    fn due_for_sweep(&self, token: &StoredToken, current_time: u64) -> bool {
        let Some(expires_at) = token.expires_at else {
            return false;
        };
        if token.refresh_token.is_none() || !token.expires_within(self.sweep_horizon, current_time)
        {
            return false;
        }

        let lifetime = expires_at.saturating_sub(token.updated_at);
        let remaining = expires_at.saturating_sub(current_time);
        remaining <= lifetime / 2
    }

    /// Refresh with the identity lock held
    async fn refresh_locked(
        &self,
        identity: &LinkedIdentity,
        token: StoredToken,
        current_time: u64,
    ) -> Result<StoredToken> {
        let identity_id = identity.identity_id;

        let refresh_token = match self.tokens.open_refresh(&token) {
            Ok(refresh_token) => refresh_token,
            Err(OAuthError::DecryptionFailed) => {
                self.flag_unreadable(identity_id).await;
                return Err(OAuthError::DecryptionFailed);
            }
            Err(error) => return Err(error),
        };

        let Some(refresh_token) = refresh_token else {
            if token.is_expired(current_time) {
                return Err(OAuthError::ReauthenticationRequired(identity_id));
            }
            return Ok(token);
        };

        let provider = self.registry.provider(&identity.provider)?;

        match provider.refresh(&refresh_token).await {
            Ok(issued) => {
                let sealed = self.tokens.seal(
                    identity_id,
                    &issued,
                    current_time,
                    token.refresh_token.clone(),
                )?;
                self.tokens.save(&sealed).await?;

                info!(
                    %identity_id,
                    provider = %identity.provider,
                    rotated = issued.refresh_token.is_some(),
                    "Provider token refreshed"
                );
                Ok(sealed)
            }
            Err(ProviderError::RefreshRejected(reason)) => {
                warn!(
                    %identity_id,
                    provider = %identity.provider,
                    reason = %reason,
                    "Refresh token rejected; re-authentication required"
                );
                self.identities.mark_reauth_required(identity_id).await?;
                Err(OAuthError::ReauthenticationRequired(identity_id))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn load(&self, identity_id: Uuid) -> Result<StoredToken> {
        self.tokens
            .load(identity_id)
            .await?
            .ok_or(OAuthError::ReauthenticationRequired(identity_id))
    }

    async fn open(&self, token: &StoredToken) -> Result<AccessToken> {
        match self.tokens.open_access(token) {
            Ok(plaintext) => Ok(AccessToken {
                token: plaintext,
                token_type: token.token_type.clone(),
                expires_at: token.expires_at,
            }),
            Err(OAuthError::DecryptionFailed) => {
                self.flag_unreadable(token.identity_id).await;
                Err(OAuthError::DecryptionFailed)
            }
            Err(error) => Err(error),
        }
    }

    async fn flag_unreadable(&self, identity_id: Uuid) {
        warn!(%identity_id, "Stored token unreadable; re-authentication required");
        if let Err(error) = self.identities.mark_reauth_required(identity_id).await {
            warn!(%identity_id, error = %error, "Failed to flag identity for re-authentication");
        }
    }
}
