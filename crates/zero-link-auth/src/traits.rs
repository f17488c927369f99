//! Engine trait and collaborator interfaces.

use crate::{audit::AuditEvent, errors::Result, types::*};
use async_trait::async_trait;
use uuid::Uuid;

/// OAuth engine operations
#[async_trait]
pub trait OAuthFlows: Send + Sync {
    /// Start an authorization; returns the provider URL to redirect to
    async fn initiate(&self, request: InitiateRequest) -> Result<AuthorizationRedirect>;

    /// Process the provider's redirect back to us
    async fn handle_callback(&self, request: CallbackRequest) -> Result<CallbackOutcome>;

    /// Finish a login paused with `ManualLinkRequired`, once the caller has
    /// verified `user_id` owns the colliding account
    async fn complete_manual_link(&self, ticket: &str, user_id: Uuid) -> Result<CallbackOutcome>;

    /// Email an unexpired manual-link ticket is waiting on; the ticket is not consumed
    async fn manual_link_email(&self, ticket: &str) -> Result<String>;

    /// Count one password check from `client_addr` against its ceiling
    async fn throttle_credentials(&self, client_addr: &str) -> Result<()>;

    /// Remove the user's identities for a provider
    async fn unlink(&self, user_id: Uuid, provider: &str) -> Result<Vec<LinkedIdentity>>;

    /// Linked identities of a user
    async fn list_identities(&self, user_id: Uuid) -> Result<Vec<LinkedIdentity>>;

    /// A usable access token for the identity, refreshing it first if needed
    async fn get_valid_access_token(&self, identity_id: Uuid) -> Result<AccessToken>;

    /// Refresh every token expiring within the sweep horizon
    async fn sweep_expiring_tokens(&self) -> Result<SweepReport>;

    /// Delete expired pending authorizations and manual-link tickets
    async fn purge_expired_pending(&self) -> Result<usize>;
}

/// Local user directory, owned by the surrounding application
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Find a user by (case-insensitive) email
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>>;

    /// Create a user seeded from a provider profile
    async fn create_user(&self, new_user: NewUser) -> Result<LocalUser>;

    /// Whether the user can sign in with a password
    async fn has_password(&self, user_id: Uuid) -> Result<bool>;
}

/// Session issuance, owned by the surrounding application
#[async_trait]
pub trait SessionManager: Send + Sync + 'static {
    /// Establish an application session for the user
    async fn establish_session(&self, user_id: Uuid) -> Result<SessionHandle>;
}

/// Sink for audit events
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record one event; must not fail the flow
    async fn record(&self, event: AuditEvent);
}
