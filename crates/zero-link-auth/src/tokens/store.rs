//! Encrypted token persistence.

use super::{ACCESS_FIELD, REFRESH_FIELD};
use crate::{errors::Result, types::StoredToken};
use std::sync::Arc;
use uuid::Uuid;
use zero_link_crypto::{token_aad, TokenCipher};
use zero_link_providers::ProviderTokens;
use zero_link_storage::{Batch, BatchExt, Storage, CF_STORED_TOKENS};
use zeroize::Zeroizing;

/// Stores one [`StoredToken`] per linked identity, encrypted with the process key.
///
/// Every blob is bound to its identity and field through the AEAD associated
/// data, so a blob copied onto another identity fails to decrypt.
pub struct TokenStore<S: Storage> {
    storage: Arc<S>,
    cipher: Arc<TokenCipher>,
}

impl<S: Storage> TokenStore<S> {
    /// Create a store over `storage`
    pub fn new(storage: Arc<S>, cipher: Arc<TokenCipher>) -> Self {
        Self { storage, cipher }
    }

    /// Encrypt freshly issued tokens for `identity_id`.
    ///
    /// When the provider did not rotate the refresh token, `previous_refresh`
    /// (an existing blob for the same identity) is carried over.
    pub fn seal(
        &self,
        identity_id: Uuid,
        tokens: &ProviderTokens,
        received_at: u64,
        previous_refresh: Option<Vec<u8>>,
    ) -> Result<StoredToken> {
        let access_token = self
            .cipher
            .encrypt_str(&tokens.access_token, &token_aad(&identity_id, ACCESS_FIELD))?;

        let refresh_token = match &tokens.refresh_token {
            Some(refresh) => Some(
                self.cipher
                    .encrypt_str(refresh, &token_aad(&identity_id, REFRESH_FIELD))?,
            ),
            None => previous_refresh,
        };

        Ok(StoredToken {
            identity_id,
            access_token,
            refresh_token,
            token_type: tokens.token_type.clone(),
            scope: tokens.scope.clone(),
            expires_at: tokens.expires_at(received_at),
            updated_at: received_at,
        })
    }

    /// Load the token record for an identity
    pub async fn load(&self, identity_id: Uuid) -> Result<Option<StoredToken>> {
        Ok(self.storage.get(CF_STORED_TOKENS, &identity_id).await?)
    }

    /// Persist a token record immediately
    pub async fn save(&self, token: &StoredToken) -> Result<()> {
        self.storage
            .put(CF_STORED_TOKENS, &token.identity_id, token)
            .await?;
        Ok(())
    }

    /// Every stored token record; rows that fail to decode are logged and left out
    pub async fn load_all(&self) -> Result<Vec<StoredToken>> {
        let entries: Vec<(Vec<u8>, StoredToken)> = self.storage.scan_all(CF_STORED_TOKENS).await?;
        Ok(entries.into_iter().map(|(_, token)| token).collect())
    }

    /// Stage a token record write
    pub fn stage_put(&self, batch: &mut dyn Batch, token: &StoredToken) -> Result<()> {
        batch.put(CF_STORED_TOKENS, &token.identity_id, token)?;
        Ok(())
    }

    /// Stage removal of an identity's tokens
    pub fn stage_delete(&self, batch: &mut dyn Batch, identity_id: Uuid) -> Result<()> {
        batch.delete(CF_STORED_TOKENS, &identity_id)?;
        Ok(())
    }

    /// Decrypt the access token
    pub fn open_access(&self, token: &StoredToken) -> Result<Zeroizing<String>> {
        Ok(self.cipher.decrypt_str(
            &token.access_token,
            &token_aad(&token.identity_id, ACCESS_FIELD),
        )?)
    }

    /// Decrypt the refresh token, if there is one
    pub fn open_refresh(&self, token: &StoredToken) -> Result<Option<Zeroizing<String>>> {
        token
            .refresh_token
            .as_ref()
            .map(|blob| {
                self.cipher
                    .decrypt_str(blob, &token_aad(&token.identity_id, REFRESH_FIELD))
                    .map_err(Into::into)
            })
            .transpose()
    }
}
