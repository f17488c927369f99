//! Single-use records for in-flight authorizations and paused manual links.
//!
//! Records are keyed by a BLAKE3 hash of the opaque token handed to the
//! browser, so a database read never yields a usable state or ticket.
//! Consumption goes through [`Storage::take`]: of two concurrent callbacks
//! carrying the same state, exactly one gets the record.

use crate::{
    errors::{OAuthError, Result},
    types::{PendingAuthorization, PendingManualLink},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use zero_link_crypto::{blake3_hash, hash_for_log};
use zero_link_storage::{Storage, CF_PENDING_AUTHORIZATIONS, CF_PENDING_MANUAL_LINKS};

/// Storage key for a state token or manual-link ticket
pub(crate) fn token_key(token: &str) -> String {
    hex::encode(blake3_hash(token.as_bytes()))
}

/// Records with an absolute expiry
trait Expiring {
    fn expires_at(&self) -> u64;
}

impl Expiring for PendingAuthorization {
    fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

impl Expiring for PendingManualLink {
    fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

/// Pending authorization and manual-link storage
pub struct PendingStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> PendingStore<S> {
    /// Create a store over `storage`
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Persist a pending authorization under `state`
    pub async fn insert(&self, state: &str, record: &PendingAuthorization) -> Result<()> {
        let inserted = self
            .storage
            .put_if_absent(CF_PENDING_AUTHORIZATIONS, &token_key(state), record)
            .await?;

        if !inserted {
            return Err(OAuthError::InvariantViolation(
                "state token collision".to_string(),
            ));
        }

        debug!(state = %hash_for_log(state.as_bytes()), provider = %record.provider, "Pending authorization stored");
        Ok(())
    }

    /// Consume the record for `state`, which must belong to `provider` and be unexpired.
    ///
    /// The record is gone after this call whatever the outcome.
    pub async fn consume(
        &self,
        state: &str,
        provider: &str,
        current_time: u64,
    ) -> Result<PendingAuthorization> {
        let state_hash = hash_for_log(state.as_bytes());

        let record: PendingAuthorization = self
            .storage
            .take(CF_PENDING_AUTHORIZATIONS, &token_key(state))
            .await?
            .ok_or_else(|| {
                debug!(state = %state_hash, "Unknown or already consumed state");
                OAuthError::InvalidOrExpiredState
            })?;

        if record.expires_at <= current_time {
            debug!(state = %state_hash, "Expired state");
            return Err(OAuthError::InvalidOrExpiredState);
        }

        if record.provider != provider {
            warn!(
                state = %state_hash,
                expected = %record.provider,
                actual = %provider,
                "State presented to the wrong provider callback"
            );
            return Err(OAuthError::InvalidOrExpiredState);
        }

        Ok(record)
    }

    /// Persist a paused manual link under `ticket`
    pub async fn insert_manual_link(&self, ticket: &str, record: &PendingManualLink) -> Result<()> {
        let inserted = self
            .storage
            .put_if_absent(CF_PENDING_MANUAL_LINKS, &token_key(ticket), record)
            .await?;

        if !inserted {
            return Err(OAuthError::InvariantViolation(
                "manual link ticket collision".to_string(),
            ));
        }
        Ok(())
    }

    /// Read an unexpired manual-link ticket without consuming it
    pub async fn peek_manual_link(
        &self,
        ticket: &str,
        current_time: u64,
    ) -> Result<PendingManualLink> {
        let record: PendingManualLink = self
            .storage
            .get(CF_PENDING_MANUAL_LINKS, &token_key(ticket))
            .await?
            .ok_or(OAuthError::InvalidManualLinkTicket)?;

        if record.expires_at <= current_time {
            return Err(OAuthError::InvalidManualLinkTicket);
        }
        Ok(record)
    }

    /// Consume an unexpired manual-link ticket
    pub async fn consume_manual_link(
        &self,
        ticket: &str,
        current_time: u64,
    ) -> Result<PendingManualLink> {
        let record: PendingManualLink = self
            .storage
            .take(CF_PENDING_MANUAL_LINKS, &token_key(ticket))
            .await?
            .ok_or(OAuthError::InvalidManualLinkTicket)?;

        if record.expires_at <= current_time {
            return Err(OAuthError::InvalidManualLinkTicket);
        }
        Ok(record)
    }

    /// Delete expired records from both column families, returning how many went
    pub async fn purge_expired(&self, current_time: u64) -> Result<usize> {
        let authorizations = self
            .purge_cf::<PendingAuthorization>(CF_PENDING_AUTHORIZATIONS, current_time)
            .await?;
        let manual_links = self
            .purge_cf::<PendingManualLink>(CF_PENDING_MANUAL_LINKS, current_time)
            .await?;
        Ok(authorizations + manual_links)
    }

    async fn purge_cf<V>(&self, cf: &str, current_time: u64) -> Result<usize>
    where
        V: DeserializeOwned + Expiring,
    {
        let entries: Vec<(Vec<u8>, V)> = self.storage.scan_all(cf).await?;
        let mut purged = 0;

        for (key, record) in entries {
            if record.expires_at() <= current_time {
                self.storage.delete_raw(cf, &key).await?;
                purged += 1;
            }
        }

        if purged > 0 {
            debug!(cf, purged, "Purged expired pending records");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intent;
    use zero_link_storage::RocksDbStorage;

    fn pending(provider: &str, expires_at: u64) -> PendingAuthorization {
        PendingAuthorization {
            code_verifier: "v".repeat(64),
            provider: provider.to_string(),
            intent: Intent::Login,
            created_at: 0,
            expires_at,
        }
    }

    fn store() -> PendingStore<RocksDbStorage> {
        PendingStore::new(Arc::new(RocksDbStorage::open_test().unwrap()))
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = store();
        store.insert("state-1", &pending("google", 600)).await.unwrap();

        let record = store.consume("state-1", "google", 10).await.unwrap();
        assert_eq!(record.provider, "google");

        let again = store.consume("state-1", "google", 10).await;
        assert!(matches!(again, Err(OAuthError::InvalidOrExpiredState)));
    }

    #[tokio::test]
    async fn test_expired_state_is_rejected_and_removed() {
        let store = store();
        store.insert("state-2", &pending("google", 600)).await.unwrap();

        let result = store.consume("state-2", "google", 600).await;
        assert!(matches!(result, Err(OAuthError::InvalidOrExpiredState)));

        let result = store.consume("state-2", "google", 10).await;
        assert!(matches!(result, Err(OAuthError::InvalidOrExpiredState)));
    }

    #[tokio::test]
    async fn test_provider_mismatch_burns_state() {
        let store = store();
        store.insert("state-3", &pending("google", 600)).await.unwrap();

        let result = store.consume("state-3", "github", 10).await;
        assert!(matches!(result, Err(OAuthError::InvalidOrExpiredState)));

        let result = store.consume("state-3", "google", 10).await;
        assert!(matches!(result, Err(OAuthError::InvalidOrExpiredState)));
    }

    #[tokio::test]
    async fn test_duplicate_state_is_refused() {
        let store = store();
        store.insert("state-4", &pending("google", 600)).await.unwrap();
        let result = store.insert("state-4", &pending("google", 600)).await;
        assert!(matches!(result, Err(OAuthError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_records() {
        let store = store();
        store.insert("old", &pending("google", 100)).await.unwrap();
        store.insert("live", &pending("google", 900)).await.unwrap();

        assert_eq!(store.purge_expired(500).await.unwrap(), 1);
        assert!(store.consume("live", "google", 500).await.is_ok());
    }

    #[test]
    fn test_key_does_not_contain_token() {
        let key = token_key("abc");
        assert_eq!(key.len(), 64);
        assert!(!key.contains("abc"));
    }
}
