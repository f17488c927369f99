//! Identity and token lifecycle operations.

use super::OAuthService;
use crate::{
    audit::AuditEvent,
    errors::Result,
    traits::{SessionManager, UserStore},
    types::{AccessToken, LinkedIdentity, SweepReport},
};
use tracing::debug;
use uuid::Uuid;
use zero_link_storage::Storage;

impl<S, U, M> OAuthService<S, U, M>
where
    S: Storage + 'static,
    U: UserStore,
    M: SessionManager,
{
    /// Remove the user's identities for `provider`, refusing to remove the last sign-in method
    pub async fn unlink_provider(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> Result<Vec<LinkedIdentity>> {
        let removed = self.linker.unlink(user_id, provider).await?;

        for identity in &removed {
            self.audit(AuditEvent::IdentityUnlinked {
                provider: identity.provider.clone(),
                user_id,
                identity_id: identity.identity_id,
            })
            .await;
        }
        Ok(removed)
    }

    /// Usable access token for `identity_id` at `current_time`
    pub async fn get_valid_access_token_at(
        &self,
        identity_id: Uuid,
        current_time: u64,
    ) -> Result<AccessToken> {
        self.refresher
            .get_valid_access_token(identity_id, current_time)
            .await
    }

    /// Run one refresh sweep at `current_time`
    pub async fn sweep_expiring_tokens_at(&self, current_time: u64) -> Result<SweepReport> {
        self.refresher.sweep(current_time).await
    }

    /// Delete expired pending records at `current_time`
    pub async fn purge_expired_pending_at(&self, current_time: u64) -> Result<usize> {
        let purged = self.pending.purge_expired(current_time).await?;
        debug!(purged, "Purged expired pending records");
        Ok(purged)
    }
}
