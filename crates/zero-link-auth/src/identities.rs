//! Linked identity records and their indexes.
//!
//! Three column families hold one identity:
//! - `linked_identities`: identity_id → [`LinkedIdentity`]
//! - `linked_identities_by_subject`: (provider, subject) → identity_id
//! - `linked_identities_by_user`: (user_id, identity_id) → identity_id
//!
//! Writers stage all three into one batch so the indexes never disagree.

use crate::{
    errors::{OAuthError, Result},
    types::LinkedIdentity,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use zero_link_storage::{
    Batch, BatchExt, Storage, CF_LINKED_IDENTITIES, CF_LINKED_IDENTITIES_BY_SUBJECT,
    CF_LINKED_IDENTITIES_BY_USER,
};

/// Linked identity storage
pub struct IdentityStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> IdentityStore<S> {
    /// Create a store over `storage`
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Load an identity by ID
    pub async fn get(&self, identity_id: Uuid) -> Result<Option<LinkedIdentity>> {
        Ok(self.storage.get(CF_LINKED_IDENTITIES, &identity_id).await?)
    }

    /// Load an identity by ID, failing if absent
    pub async fn require(&self, identity_id: Uuid) -> Result<LinkedIdentity> {
        self.get(identity_id)
            .await?
            .ok_or(OAuthError::IdentityNotFound)
    }

    /// Find the identity linked for `(provider, subject)`
    pub async fn find_by_subject(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<LinkedIdentity>> {
        let identity_id: Option<Uuid> = self
            .storage
            .get(
                CF_LINKED_IDENTITIES_BY_SUBJECT,
                &(provider.to_string(), subject.to_string()),
            )
            .await?;

        let Some(identity_id) = identity_id else {
            return Ok(None);
        };

        match self.get(identity_id).await? {
            Some(identity) => Ok(Some(identity)),
            None => {
                error!(%identity_id, provider, "Subject index points at a missing identity");
                Err(OAuthError::InvariantViolation(format!(
                    "subject index references missing identity {}",
                    identity_id
                )))
            }
        }
    }

    /// All identities linked to `user_id`
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<LinkedIdentity>> {
        let index: Vec<(Vec<u8>, Uuid)> = self
            .storage
            .get_by_prefix(CF_LINKED_IDENTITIES_BY_USER, &user_id)
            .await?;

        let mut identities = Vec::with_capacity(index.len());
        for (_, identity_id) in index {
            match self.get(identity_id).await? {
                Some(identity) => identities.push(identity),
                None => {
                    error!(%identity_id, %user_id, "User index points at a missing identity");
                    return Err(OAuthError::InvariantViolation(format!(
                        "user index references missing identity {}",
                        identity_id
                    )));
                }
            }
        }

        identities.sort_by_key(|identity| identity.created_at);
        Ok(identities)
    }

    /// Stage a new identity and both of its index entries
    pub fn stage_insert(&self, batch: &mut dyn Batch, identity: &LinkedIdentity) -> Result<()> {
        batch.put(CF_LINKED_IDENTITIES, &identity.identity_id, identity)?;
        batch.put(
            CF_LINKED_IDENTITIES_BY_SUBJECT,
            &(identity.provider.clone(), identity.subject.clone()),
            &identity.identity_id,
        )?;
        batch.put(
            CF_LINKED_IDENTITIES_BY_USER,
            &(identity.user_id, identity.identity_id),
            &identity.identity_id,
        )?;
        Ok(())
    }

    /// Stage an update of an identity's mutable fields
    pub fn stage_update(&self, batch: &mut dyn Batch, identity: &LinkedIdentity) -> Result<()> {
        batch.put(CF_LINKED_IDENTITIES, &identity.identity_id, identity)?;
        Ok(())
    }

    /// Stage removal of an identity and both index entries
    pub fn stage_delete(&self, batch: &mut dyn Batch, identity: &LinkedIdentity) -> Result<()> {
        batch.delete(CF_LINKED_IDENTITIES, &identity.identity_id)?;
        batch.delete(
            CF_LINKED_IDENTITIES_BY_SUBJECT,
            &(identity.provider.clone(), identity.subject.clone()),
        )?;
        batch.delete(
            CF_LINKED_IDENTITIES_BY_USER,
            &(identity.user_id, identity.identity_id),
        )?;
        Ok(())
    }

    /// Flag the identity's tokens as unusable until the next sign-in
    pub async fn mark_reauth_required(&self, identity_id: Uuid) -> Result<()> {
        if let Some(mut identity) = self.get(identity_id).await? {
            if !identity.reauth_required {
                identity.reauth_required = true;
                self.storage
                    .put(CF_LINKED_IDENTITIES, &identity_id, &identity)
                    .await?;
            }
        }
        Ok(())
    }
}
