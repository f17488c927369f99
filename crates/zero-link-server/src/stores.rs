//! RocksDB-backed user directory and session manager.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use zero_link_auth::{
    current_timestamp, LocalUser, NewUser, OAuthError, Result, SessionHandle, SessionManager,
    UserStore,
};
use zero_link_crypto::{
    blake3_hash, generate_random_token, generate_salt, hash_password, verify_password,
};
use zero_link_storage::{RocksDbStorage, Storage, CF_SESSIONS, CF_USERS, CF_USERS_BY_EMAIL};

const SESSION_TOKEN_BYTES: usize = 32;
/// Shortest accepted local password
pub const MIN_PASSWORD_LEN: usize = 8;

/// Persisted local user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Argon2id PHC string
    pub password_hash: Option<String>,
    pub created_at: u64,
}

impl From<&UserRecord> for LocalUser {
    fn from(record: &UserRecord) -> Self {
        LocalUser {
            user_id: record.user_id,
            email: Some(record.email.clone()),
            display_name: record.display_name.clone(),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Users keyed by ID, with a unique index on the lower-cased email
pub struct RocksUserStore {
    storage: Arc<RocksDbStorage>,
}

impl RocksUserStore {
    pub fn new(storage: Arc<RocksDbStorage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.storage.get(CF_USERS, &user_id).await?)
    }

    /// Set (or replace) the user's password
    pub async fn set_password(&self, user_id: Uuid, password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(OAuthError::UserStore(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut record = self.get(user_id).await?.ok_or(OAuthError::UserNotFound)?;

        // Argon2 is CPU-bound; keep it off the async workers
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || {
            let salt = generate_salt();
            hash_password(password.as_bytes(), &salt)
        })
        .await
        .map_err(|e| OAuthError::UserStore(format!("password hashing task failed: {}", e)))?
        .map_err(|e| OAuthError::UserStore(e.to_string()))?;

        record.password_hash = Some(hash);
        self.storage.put(CF_USERS, &user_id, &record).await?;

        tracing::info!(%user_id, "Password set");
        Ok(())
    }

    /// Whether `password` matches the user's stored hash
    pub async fn check_password(&self, user_id: Uuid, password: &str) -> Result<bool> {
        let Some(hash) = self.get(user_id).await?.and_then(|record| record.password_hash) else {
            return Ok(false);
        };

        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(password.as_bytes(), &hash).is_ok())
            .await
            .map_err(|e| OAuthError::UserStore(format!("password check task failed: {}", e)))
    }

    /// The user owning `email`, if `password` matches
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<Uuid>> {
        let Some(user_id) = self.user_id_for_email(email).await? else {
            return Ok(None);
        };
        Ok(self
            .check_password(user_id, password)
            .await?
            .then_some(user_id))
    }

    async fn user_id_for_email(&self, email: &str) -> Result<Option<Uuid>> {
        Ok(self
            .storage
            .get(CF_USERS_BY_EMAIL, &normalize_email(email))
            .await?)
    }
}

#[async_trait]
impl UserStore for RocksUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>> {
        let Some(user_id) = self.user_id_for_email(email).await? else {
            return Ok(None);
        };
        Ok(self.get(user_id).await?.as_ref().map(LocalUser::from))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<LocalUser> {
        let email = normalize_email(&new_user.email);
        let user_id = Uuid::new_v4();

        let claimed = self
            .storage
            .put_if_absent(CF_USERS_BY_EMAIL, &email, &user_id)
            .await?;
        if !claimed {
            return Err(OAuthError::UserStore("email already registered".to_string()));
        }

        let record = UserRecord {
            user_id,
            email: new_user.email,
            email_verified: new_user.email_verified,
            display_name: new_user.display_name,
            avatar_url: new_user.avatar_url,
            password_hash: None,
            created_at: current_timestamp(),
        };
        self.storage.put(CF_USERS, &user_id, &record).await?;

        tracing::info!(%user_id, "User created");
        Ok(LocalUser::from(&record))
    }

    async fn has_password(&self, user_id: Uuid) -> Result<bool> {
        Ok(self
            .get(user_id)
            .await?
            .is_some_and(|record| record.password_hash.is_some()))
    }
}

/// Persisted session, keyed by a hash of its token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub created_at: u64,
    pub expires_at: u64,
}

fn session_key(token: &str) -> [u8; 32] {
    blake3_hash(token.as_bytes())
}

/// Opaque bearer sessions
pub struct RocksSessionManager {
    storage: Arc<RocksDbStorage>,
    ttl: u64,
}

impl RocksSessionManager {
    pub fn new(storage: Arc<RocksDbStorage>, ttl: u64) -> Self {
        Self { storage, ttl }
    }

    /// User behind a live session token
    pub async fn authenticate(&self, token: &str, current_time: u64) -> Result<Option<Uuid>> {
        let key = session_key(token);
        let record: Option<SessionRecord> = self.storage.get(CF_SESSIONS, &key).await?;

        match record {
            Some(record) if record.expires_at > current_time => Ok(Some(record.user_id)),
            Some(_) => {
                self.storage.delete(CF_SESSIONS, &key).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Delete expired sessions
    pub async fn purge_expired(&self, current_time: u64) -> Result<usize> {
        let sessions: Vec<(Vec<u8>, SessionRecord)> = self.storage.scan_all(CF_SESSIONS).await?;
        let mut purged = 0;
        for (key, record) in sessions {
            if record.expires_at <= current_time {
                self.storage.delete_raw(CF_SESSIONS, &key).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[async_trait]
impl SessionManager for RocksSessionManager {
    async fn establish_session(&self, user_id: Uuid) -> Result<SessionHandle> {
        let token = generate_random_token(SESSION_TOKEN_BYTES)
            .map_err(|e| OAuthError::Session(e.to_string()))?;
        let now = current_timestamp();
        let record = SessionRecord {
            user_id,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.storage
            .put(CF_SESSIONS, &session_key(&token), &record)
            .await?;

        tracing::debug!(%user_id, "Session established");
        Ok(SessionHandle {
            token,
            expires_at: record.expires_at,
        })
    }
}
