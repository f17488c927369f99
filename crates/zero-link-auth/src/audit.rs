//! Audit events.

use crate::traits::AuditLog;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// One auditable occurrence in the OAuth flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Authorization URL issued
    AuthorizationInitiated {
        /// Provider key
        provider: String,
        /// `login` or `link`
        intent: &'static str,
        /// Client address
        client_addr: String,
    },
    /// Login completed
    LoginSucceeded {
        /// Provider key
        provider: String,
        /// Authenticated user
        user_id: Uuid,
        /// Identity used
        identity_id: Uuid,
        /// A new local user was created
        created_user: bool,
        /// Identity was attached to an existing user by verified email
        auto_linked: bool,
    },
    /// Login or link attempt failed
    LoginFailed {
        /// Provider key
        provider: String,
        /// Machine-safe error code
        reason: &'static str,
        /// Client address, when known
        client_addr: Option<String>,
    },
    /// Identity attached to a user
    IdentityLinked {
        /// Provider key
        provider: String,
        /// Owning user
        user_id: Uuid,
        /// New identity
        identity_id: Uuid,
    },
    /// Identity removed from a user
    IdentityUnlinked {
        /// Provider key
        provider: String,
        /// Owning user
        user_id: Uuid,
        /// Removed identity
        identity_id: Uuid,
    },
    /// A client hit a rate limit
    RateLimitExceeded {
        /// `initiate`, `callback` or `credentials`
        endpoint: &'static str,
        /// Client address
        client_addr: String,
        /// Retry hint in seconds
        retry_after_seconds: u64,
    },
}

/// Writes each event as one structured record on the `zero_link::audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, event: AuditEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));

        match &event {
            AuditEvent::LoginFailed { .. } | AuditEvent::RateLimitExceeded { .. } => {
                tracing::warn!(target: "zero_link::audit", event = %payload, "audit");
            }
            _ => {
                tracing::info!(target: "zero_link::audit", event = %payload, "audit");
            }
        }
    }
}
