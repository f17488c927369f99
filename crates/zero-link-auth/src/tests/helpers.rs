//! Test helpers and mocks for the OAuth engine tests.

use crate::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use zero_link_crypto::TokenCipher;
use zero_link_policy::{RateLimitConfig, RateLimitRule};
use zero_link_providers::{
    ClientAuthMethod, IdentityProvider, ProviderConfig, ProviderError, ProviderProfile,
    ProviderRegistry, ProviderTokens,
};
use zero_link_storage::RocksDbStorage;

pub const NOW: u64 = 1_700_000_000;
pub const CLIENT: &str = "203.0.113.7";

/// How the fake provider answers refresh requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshBehavior {
    /// New access token and a rotated refresh token
    Rotate,
    /// New access token only
    AccessOnly,
    /// `invalid_grant`
    Reject,
}

/// In-process identity provider with scripted answers
pub struct FakeProvider {
    config: ProviderConfig,
    profile: Mutex<ProviderProfile>,
    refresh_behavior: Mutex<RefreshBehavior>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    unavailable: AtomicBool,
    last_verifier: Mutex<Option<String>>,
    pub expires_in: u64,
}

impl FakeProvider {
    pub fn new(key: &str) -> Self {
        Self {
            config: ProviderConfig {
                key: key.to_string(),
                display_name: key.to_string(),
                auth_url: format!("https://{}.example/authorize", key),
                token_url: format!("https://{}.example/token", key),
                user_info_url: format!("https://{}.example/userinfo", key),
                scopes: vec!["openid".to_string(), "email".to_string()],
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: format!("https://app.example/auth/oauth/{}/callback", key),
                enabled: true,
                client_auth: ClientAuthMethod::RequestBody,
                extra_auth_params: Vec::new(),
            },
            profile: Mutex::new(profile("subject-1", Some("someone@example.com"), true)),
            refresh_behavior: Mutex::new(RefreshBehavior::Rotate),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            last_verifier: Mutex::new(None),
            expires_in: 3600,
        }
    }

    pub fn set_profile(&self, profile: ProviderProfile) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        *self.refresh_behavior.lock().unwrap() = behavior;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_verifier(&self) -> Option<String> {
        self.last_verifier.lock().unwrap().clone()
    }

    fn next_tokens(&self, with_refresh: bool) -> ProviderTokens {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        ProviderTokens {
            access_token: format!("access-{}", n),
            refresh_token: with_refresh.then(|| format!("refresh-{}", n)),
            token_type: "Bearer".to_string(),
            scope: Some("openid email".to_string()),
            expires_in: Some(self.expires_in),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_auth_url(
        &self,
        state: &str,
        code_challenge: &str,
    ) -> zero_link_providers::Result<String> {
        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.auth_url, self.config.client_id, self.config.redirect_uri, state, code_challenge
        ))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> zero_link_providers::Result<ProviderTokens> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("timed out".to_string()));
        }
        *self.last_verifier.lock().unwrap() = Some(code_verifier.to_string());
        if code == "bad-code" {
            return Err(ProviderError::TokenExchangeFailed("invalid_grant".to_string()));
        }
        Ok(self.next_tokens(true))
    }

    async fn fetch_profile(&self, _access_token: &str) -> zero_link_providers::Result<ProviderProfile> {
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn refresh(&self, _refresh_token: &str) -> zero_link_providers::Result<ProviderTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let behavior = *self.refresh_behavior.lock().unwrap();
        match behavior {
            RefreshBehavior::Rotate => Ok(self.next_tokens(true)),
            RefreshBehavior::AccessOnly => Ok(self.next_tokens(false)),
            RefreshBehavior::Reject => {
                Err(ProviderError::RefreshRejected("invalid_grant".to_string()))
            }
        }
    }
}

pub fn profile(subject: &str, email: Option<&str>, email_verified: bool) -> ProviderProfile {
    ProviderProfile {
        subject: subject.to_string(),
        email: email.map(str::to_string),
        email_verified,
        display_name: Some("Test User".to_string()),
        avatar_url: None,
    }
}

#[derive(Clone)]
struct UserEntry {
    user: LocalUser,
    has_password: bool,
}

/// In-memory user store
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, UserEntry>>,
}

impl MemoryUserStore {
    pub fn add_user(&self, email: &str, has_password: bool) -> Uuid {
        let user_id = Uuid::new_v4();
        self.users.lock().unwrap().insert(
            user_id,
            UserEntry {
                user: LocalUser {
                    user_id,
                    email: Some(email.to_string()),
                    display_name: None,
                },
                has_password,
            },
        );
        user_id
    }

    pub fn set_password(&self, user_id: Uuid) {
        if let Some(entry) = self.users.lock().unwrap().get_mut(&user_id) {
            entry.has_password = true;
        }
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|entry| {
                entry
                    .user
                    .email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .map(|entry| entry.user.clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<LocalUser> {
        let user = LocalUser {
            user_id: Uuid::new_v4(),
            email: Some(new_user.email),
            display_name: new_user.display_name,
        };
        self.users.lock().unwrap().insert(
            user.user_id,
            UserEntry {
                user: user.clone(),
                has_password: false,
            },
        );
        Ok(user)
    }

    async fn has_password(&self, user_id: Uuid) -> Result<bool> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|entry| entry.has_password)
            .unwrap_or(false))
    }
}

/// Session manager that records who got a session
#[derive(Default)]
pub struct RecordingSessions {
    established: Mutex<Vec<Uuid>>,
    failing: AtomicBool,
}

impl RecordingSessions {
    pub fn established(&self) -> Vec<Uuid> {
        self.established.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionManager for RecordingSessions {
    async fn establish_session(&self, user_id: Uuid) -> Result<SessionHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OAuthError::Session("session store offline".to_string()));
        }
        self.established.lock().unwrap().push(user_id);
        Ok(SessionHandle {
            token: format!("session-{}", user_id),
            expires_at: NOW + 3600,
        })
    }
}

/// Audit log that keeps every event
#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLog for RecordingAudit {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub type TestService = OAuthService<RocksDbStorage, MemoryUserStore, RecordingSessions>;

/// Engine wired to fakes, with handles on every collaborator
pub struct Harness {
    pub service: Arc<TestService>,
    pub storage: Arc<RocksDbStorage>,
    pub provider: Arc<FakeProvider>,
    pub other: Arc<FakeProvider>,
    pub users: Arc<MemoryUserStore>,
    pub sessions: Arc<RecordingSessions>,
    pub audit: Arc<RecordingAudit>,
}

/// Harness with limits high enough that multi-step tests never trip them
pub fn harness() -> Harness {
    harness_with(EngineConfig {
        rate_limits: RateLimitConfig {
            initiate: RateLimitRule::per_minute(1_000),
            callback: RateLimitRule::per_minute(1_000),
            credentials: RateLimitRule::per_minute(1_000),
        },
        ..EngineConfig::default()
    })
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let storage = Arc::new(RocksDbStorage::open_test().unwrap());
    let provider = Arc::new(FakeProvider::new("fakeid"));
    let other = Arc::new(FakeProvider::new("otherid"));

    let mut registry = ProviderRegistry::new();
    registry.register(provider.clone());
    registry.register(other.clone());
    let mut disabled = FakeProvider::new("dormant").config().clone();
    disabled.client_secret.clear();
    registry.register_disabled(disabled);

    let users = Arc::new(MemoryUserStore::default());
    let sessions = Arc::new(RecordingSessions::default());
    let audit = Arc::new(RecordingAudit::default());

    let service = Arc::new(OAuthService::new(
        Arc::clone(&storage),
        Arc::new(registry),
        Arc::new(TokenCipher::generate().unwrap()),
        Arc::clone(&users),
        Arc::clone(&sessions),
        audit.clone(),
        config,
    ));

    Harness {
        service,
        storage,
        provider,
        other,
        users,
        sessions,
        audit,
    }
}

/// Query parameter of an authorization URL
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

impl Harness {
    /// Initiate against the default provider and return the state token
    pub async fn start(&self, intent: Intent, now: u64) -> String {
        self.start_on("fakeid", intent, now).await
    }

    /// Initiate against `provider` and return the state token
    pub async fn start_on(&self, provider: &str, intent: Intent, now: u64) -> String {
        let redirect = self
            .service
            .initiate_at(
                InitiateRequest {
                    provider: provider.to_string(),
                    intent,
                    client_addr: CLIENT.to_string(),
                },
                now,
            )
            .await
            .unwrap();
        query_param(&redirect.authorization_url, "state").unwrap()
    }

    /// Deliver a callback for `state` to the default provider
    pub async fn callback(&self, state: &str, now: u64) -> Result<CallbackOutcome> {
        self.callback_on("fakeid", state, now).await
    }

    /// Deliver a callback for `state` to `provider`
    pub async fn callback_on(&self, provider: &str, state: &str, now: u64) -> Result<CallbackOutcome> {
        self.callback_as(provider, state, None, now).await
    }

    /// Deliver a callback for `state` from a browser signed in as `session_user`
    pub async fn callback_as(
        &self,
        provider: &str,
        state: &str,
        session_user: Option<Uuid>,
        now: u64,
    ) -> Result<CallbackOutcome> {
        self.service
            .handle_callback_at(
                CallbackRequest {
                    provider: provider.to_string(),
                    code: Some("good-code".to_string()),
                    state: Some(state.to_string()),
                    client_addr: CLIENT.to_string(),
                    session_user,
                    ..Default::default()
                },
                now,
            )
            .await
    }

    /// Full login round trip
    pub async fn login(&self, now: u64) -> Result<CallbackOutcome> {
        let state = self.start(Intent::Login, now).await;
        self.callback(&state, now).await
    }

    /// Full link round trip for `user_id` against `provider`
    pub async fn link_on(&self, provider: &str, user_id: Uuid, now: u64) -> Result<CallbackOutcome> {
        let state = self.start_on(provider, Intent::Link { user_id }, now).await;
        self.callback_as(provider, &state, Some(user_id), now).await
    }

    /// Full link round trip for `user_id` against the default provider
    pub async fn link(&self, user_id: Uuid, now: u64) -> Result<CallbackOutcome> {
        self.link_on("fakeid", user_id, now).await
    }
}
