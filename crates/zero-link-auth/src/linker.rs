//! Account linking: mapping provider identities onto local users.
//!
//! Every decision for one `(provider, subject)` runs under that subject's
//! lock, and every outcome is persisted with one atomic write batch holding
//! the identity, its indexes and its tokens. A failure anywhere before the
//! commit leaves nothing behind.

use crate::{
    errors::{OAuthError, Result},
    identities::IdentityStore,
    locks::{identity_key, subject_key, user_key, KeyedLocks},
    pending::PendingStore,
    tokens::TokenStore,
    traits::UserStore,
    types::{Intent, LinkedIdentity, NewUser, PendingManualLink, StoredToken},
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zero_link_crypto::{generate_random_token, hash_for_log};
use zero_link_providers::{ProviderProfile, ProviderTokens};
use zero_link_storage::Storage;

/// Entropy of a manual-link ticket
const MANUAL_LINK_TICKET_BYTES: usize = 32;

/// What the linker decided
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    /// Owning user
    pub user_id: Uuid,
    /// Identity used or created
    pub identity: LinkedIdentity,
    /// A new local user was created
    pub created_user: bool,
    /// Identity attached to an existing user by verified email
    pub auto_linked: bool,
    /// Identity did not exist before this call
    pub new_identity: bool,
}

/// Resolves provider profiles to local users and persists the result
pub struct AccountLinker<S: Storage, U: UserStore> {
    storage: Arc<S>,
    identities: Arc<IdentityStore<S>>,
    tokens: Arc<TokenStore<S>>,
    pending: Arc<PendingStore<S>>,
    users: Arc<U>,
    locks: Arc<KeyedLocks>,
    manual_link_ttl: u64,
}

impl<S: Storage, U: UserStore> AccountLinker<S, U> {
    /// Create a linker
    pub fn new(
        storage: Arc<S>,
        identities: Arc<IdentityStore<S>>,
        tokens: Arc<TokenStore<S>>,
        pending: Arc<PendingStore<S>>,
        users: Arc<U>,
        locks: Arc<KeyedLocks>,
        manual_link_ttl: u64,
    ) -> Self {
        Self {
            storage,
            identities,
            tokens,
            pending,
            users,
            locks,
            manual_link_ttl,
        }
    }

    /// Resolve `profile` under `intent` and persist the identity with its tokens
    pub async fn resolve(
        &self,
        provider: &str,
        profile: &ProviderProfile,
        issued: &ProviderTokens,
        intent: Intent,
        current_time: u64,
    ) -> Result<LinkOutcome> {
        let _subject_guard = self
            .locks
            .lock(&subject_key(provider, &profile.subject))
            .await;

        let existing = self
            .identities
            .find_by_subject(provider, &profile.subject)
            .await?;

        if let Some(existing) = existing {
            if let Intent::Link { user_id } = intent {
                if existing.user_id != user_id {
                    warn!(
                        provider,
                        subject = %hash_for_log(profile.subject.as_bytes()),
                        %user_id,
                        "Identity already linked to another user"
                    );
                    return Err(OAuthError::AlreadyLinkedToAnotherUser);
                }
            }
            return self
                .refresh_existing(existing, profile, issued, current_time)
                .await;
        }

        match intent {
            Intent::Link { user_id } => {
                let identity =
                    new_identity(Uuid::new_v4(), user_id, provider, profile, current_time);
                let token = self
                    .tokens
                    .seal(identity.identity_id, issued, current_time, None)?;
                self.commit_new(&identity, &token).await?;

                Ok(LinkOutcome {
                    user_id,
                    identity,
                    created_user: false,
                    auto_linked: false,
                    new_identity: true,
                })
            }
            Intent::Login => self.resolve_login(provider, profile, issued, current_time).await,
        }
    }

    /// Login for a subject seen for the first time
    async fn resolve_login(
        &self,
        provider: &str,
        profile: &ProviderProfile,
        issued: &ProviderTokens,
        current_time: u64,
    ) -> Result<LinkOutcome> {
        let email = profile.email.as_deref().ok_or(OAuthError::EmailRequired)?;
        let identity_id = Uuid::new_v4();

        match self.users.find_by_email(email).await? {
            Some(user) if profile.email_verified => {
                let identity =
                    new_identity(identity_id, user.user_id, provider, profile, current_time);
                let token = self.tokens.seal(identity_id, issued, current_time, None)?;
                self.commit_new(&identity, &token).await?;

                info!(provider, user_id = %user.user_id, "Auto-linked identity by verified email");
                Ok(LinkOutcome {
                    user_id: user.user_id,
                    identity,
                    created_user: false,
                    auto_linked: true,
                    new_identity: true,
                })
            }
            Some(_) => {
                let token = self.tokens.seal(identity_id, issued, current_time, None)?;
                let ticket = generate_random_token(MANUAL_LINK_TICKET_BYTES)?;
                let record = PendingManualLink {
                    identity_id,
                    provider: provider.to_string(),
                    profile: profile.clone(),
                    tokens: token,
                    created_at: current_time,
                    expires_at: current_time + self.manual_link_ttl,
                };
                self.pending.insert_manual_link(&ticket, &record).await?;

                info!(provider, "Unverified email collides with a local account; manual link required");
                Err(OAuthError::ManualLinkRequired {
                    ticket,
                    email: email.to_string(),
                })
            }
            None => {
                let user = self
                    .users
                    .create_user(NewUser {
                        email: email.to_string(),
                        email_verified: profile.email_verified,
                        display_name: profile.display_name.clone(),
                        avatar_url: profile.avatar_url.clone(),
                    })
                    .await?;

                let identity =
                    new_identity(identity_id, user.user_id, provider, profile, current_time);
                let token = self.tokens.seal(identity_id, issued, current_time, None)?;
                self.commit_new(&identity, &token).await?;

                info!(provider, user_id = %user.user_id, "Created user from provider profile");
                Ok(LinkOutcome {
                    user_id: user.user_id,
                    identity,
                    created_user: true,
                    auto_linked: false,
                    new_identity: true,
                })
            }
        }
    }

    /// Sign-in through an identity that already exists: new tokens, fresh profile fields
    async fn refresh_existing(
        &self,
        mut identity: LinkedIdentity,
        profile: &ProviderProfile,
        issued: &ProviderTokens,
        current_time: u64,
    ) -> Result<LinkOutcome> {
        let _identity_guard = self
            .locks
            .lock(&identity_key(&identity.identity_id))
            .await;

        let previous_refresh = self
            .tokens
            .load(identity.identity_id)
            .await?
            .and_then(|token| token.refresh_token);
        let token = self
            .tokens
            .seal(identity.identity_id, issued, current_time, previous_refresh)?;

        identity.email = profile.email.clone().or(identity.email);
        identity.email_verified = profile.email_verified;
        identity.display_name = profile.display_name.clone().or(identity.display_name);
        identity.avatar_url = profile.avatar_url.clone().or(identity.avatar_url);
        identity.last_login_at = current_time;
        identity.reauth_required = false;

        let mut batch = self.storage.batch();
        self.identities.stage_update(batch.as_mut(), &identity)?;
        self.tokens.stage_put(batch.as_mut(), &token)?;
        batch.commit().await?;

        debug!(identity_id = %identity.identity_id, "Existing identity signed in");
        Ok(LinkOutcome {
            user_id: identity.user_id,
            identity,
            created_user: false,
            auto_linked: false,
            new_identity: false,
        })
    }

    /// Finish a paused login once `user_id` has proven ownership of the colliding account
    pub async fn complete_manual_link(
        &self,
        ticket: &str,
        user_id: Uuid,
        current_time: u64,
    ) -> Result<LinkOutcome> {
        let record = self
            .pending
            .consume_manual_link(ticket, current_time)
            .await?;
        let email = record
            .profile
            .email
            .as_deref()
            .ok_or(OAuthError::InvalidManualLinkTicket)?;

        let owner = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(OAuthError::UserNotFound)?;
        if owner.user_id != user_id {
            warn!(%user_id, "Manual link ticket presented for another account");
            return Err(OAuthError::InvalidManualLinkTicket);
        }

        let _subject_guard = self
            .locks
            .lock(&subject_key(&record.provider, &record.profile.subject))
            .await;

        if let Some(existing) = self
            .identities
            .find_by_subject(&record.provider, &record.profile.subject)
            .await?
        {
            if existing.user_id != user_id {
                return Err(OAuthError::AlreadyLinkedToAnotherUser);
            }
            return Ok(LinkOutcome {
                user_id,
                identity: existing,
                created_user: false,
                auto_linked: false,
                new_identity: false,
            });
        }

        let identity = new_identity(
            record.identity_id,
            user_id,
            &record.provider,
            &record.profile,
            current_time,
        );
        self.commit_new(&identity, &record.tokens).await?;

        info!(%user_id, provider = %record.provider, "Manual link completed");
        Ok(LinkOutcome {
            user_id,
            identity,
            created_user: false,
            auto_linked: false,
            new_identity: true,
        })
    }

    /// Remove every identity `user_id` has for `provider`.
    ///
    /// Refused when the user would be left with no identity and no password.
    pub async fn unlink(&self, user_id: Uuid, provider: &str) -> Result<Vec<LinkedIdentity>> {
        let _user_guard = self.locks.lock(&user_key(&user_id)).await;

        let (removed, remaining): (Vec<_>, Vec<_>) = self
            .identities
            .list_for_user(user_id)
            .await?
            .into_iter()
            .partition(|identity| identity.provider == provider);

        if removed.is_empty() {
            return Err(OAuthError::IdentityNotFound);
        }

        if remaining.is_empty() && !self.users.has_password(user_id).await? {
            info!(%user_id, provider, "Refusing to remove last authentication method");
            return Err(OAuthError::CannotRemoveLastAuthMethod);
        }

        let mut identity_ids: Vec<Uuid> = removed.iter().map(|i| i.identity_id).collect();
        identity_ids.sort();
        let mut identity_guards = Vec::with_capacity(identity_ids.len());
        for identity_id in &identity_ids {
            identity_guards.push(self.locks.lock(&identity_key(identity_id)).await);
        }

        let mut batch = self.storage.batch();
        for identity in &removed {
            self.identities.stage_delete(batch.as_mut(), identity)?;
            self.tokens.stage_delete(batch.as_mut(), identity.identity_id)?;
        }
        batch.commit().await?;

        info!(%user_id, provider, removed = removed.len(), "Unlinked provider");
        Ok(removed)
    }

    /// Remove an identity this linker just created, with its tokens.
    ///
    /// Undoes `commit_new` when the step after linking fails; an identity
    /// that existed before the current sign-in is never passed here.
    pub async fn discard_new(&self, identity: &LinkedIdentity) -> Result<()> {
        let _subject_guard = self
            .locks
            .lock(&subject_key(&identity.provider, &identity.subject))
            .await;
        let _identity_guard = self.locks.lock(&identity_key(&identity.identity_id)).await;

        let mut batch = self.storage.batch();
        self.identities.stage_delete(batch.as_mut(), identity)?;
        self.tokens.stage_delete(batch.as_mut(), identity.identity_id)?;
        batch.commit().await?;

        info!(identity_id = %identity.identity_id, provider = %identity.provider, "Discarded new identity");
        Ok(())
    }

    async fn commit_new(&self, identity: &LinkedIdentity, token: &StoredToken) -> Result<()> {
        let mut batch = self.storage.batch();
        self.identities.stage_insert(batch.as_mut(), identity)?;
        self.tokens.stage_put(batch.as_mut(), token)?;
        batch.commit().await?;
        Ok(())
    }
}

fn new_identity(
    identity_id: Uuid,
    user_id: Uuid,
    provider: &str,
    profile: &ProviderProfile,
    current_time: u64,
) -> LinkedIdentity {
    LinkedIdentity {
        identity_id,
        user_id,
        provider: provider.to_string(),
        subject: profile.subject.clone(),
        email: profile.email.clone(),
        email_verified: profile.email_verified,
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        created_at: current_time,
        last_login_at: current_time,
        reauth_required: false,
    }
}
