//! OAuth engine type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zero_link_providers::ProviderProfile;
use zeroize::Zeroizing;

/// What a completed authorization should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Sign in (or sign up) with the provider identity
    Login,
    /// Attach the provider identity to an already authenticated user
    Link {
        /// Local user being linked to
        user_id: Uuid,
    },
}

impl Intent {
    /// Short name for logs and audit events
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Login => "login",
            Intent::Link { .. } => "link",
        }
    }
}

/// Server-side record of one in-flight authorization.
///
/// Stored under a hash of the state token; single-use.
#[derive(Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// PKCE code verifier
    pub code_verifier: String,

    /// Provider key
    pub provider: String,

    /// Login or link
    pub intent: Intent,

    /// Creation timestamp
    pub created_at: u64,

    /// Expiry timestamp
    pub expires_at: u64,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("code_verifier", &"<redacted>")
            .field("provider", &self.provider)
            .field("intent", &self.intent)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Durable association between a local user and one provider identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    /// Identity ID
    pub identity_id: Uuid,

    /// Owning local user
    pub user_id: Uuid,

    /// Provider key
    pub provider: String,

    /// Provider-assigned subject id
    pub subject: String,

    /// Email as reported by the provider
    pub email: Option<String>,

    /// Whether the provider attested the email
    pub email_verified: bool,

    /// Display name
    pub display_name: Option<String>,

    /// Avatar URL
    pub avatar_url: Option<String>,

    /// Link creation timestamp
    pub created_at: u64,

    /// Last successful sign-in through this identity
    pub last_login_at: u64,

    /// Stored tokens are unusable until the user signs in again
    pub reauth_required: bool,
}

/// Encrypted provider tokens owned by one linked identity
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Owning identity
    pub identity_id: Uuid,

    /// `nonce || ciphertext || tag` of the access token
    pub access_token: Vec<u8>,

    /// Same layout for the refresh token, if the provider issued one
    pub refresh_token: Option<Vec<u8>>,

    /// Token type (normally `Bearer`)
    pub token_type: String,

    /// Granted scope string
    pub scope: Option<String>,

    /// Access token expiry; `None` if the provider did not report one
    pub expires_at: Option<u64>,

    /// Last write timestamp
    pub updated_at: u64,
}

impl StoredToken {
    /// Whether the access token expires within `margin` seconds of `now`
    pub fn expires_within(&self, margin: u64, now: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now.saturating_add(margin),
            None => false,
        }
    }

    /// Whether the access token is already expired
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_within(0, now)
    }
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("identity_id", &self.identity_id)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A provider login paused because its email collides with an unverified claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingManualLink {
    /// Identity ID reserved for the link (tokens are already bound to it)
    pub identity_id: Uuid,

    /// Provider key
    pub provider: String,

    /// Provider profile
    pub profile: ProviderProfile,

    /// Encrypted tokens
    pub tokens: StoredToken,

    /// Creation timestamp
    pub created_at: u64,

    /// Expiry timestamp
    pub expires_at: u64,
}

/// Decrypted access token handed to callers of `get_valid_access_token`
pub struct AccessToken {
    /// Plaintext token, wiped on drop
    pub token: Zeroizing<String>,

    /// Token type
    pub token_type: String,

    /// Expiry
    pub expires_at: Option<u64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Local user as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// User ID
    pub user_id: Uuid,

    /// Primary email
    pub email: Option<String>,

    /// Display name
    pub display_name: Option<String>,
}

/// Seed for a user created from a provider profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Email reported by the provider
    pub email: String,

    /// Whether the provider verified it
    pub email_verified: bool,

    /// Display name
    pub display_name: Option<String>,

    /// Avatar URL
    pub avatar_url: Option<String>,
}

/// Opaque session produced by the session collaborator
#[derive(Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Session token for the transport layer
    pub token: String,

    /// Expiry timestamp
    pub expires_at: u64,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Start of an authorization flow
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    /// Provider key
    pub provider: String,

    /// Login or link
    pub intent: Intent,

    /// Client address for rate limiting
    pub client_addr: String,
}

/// Where to send the browser
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRedirect {
    /// Provider authorization URL
    pub authorization_url: String,

    /// When the pending authorization expires
    pub expires_at: u64,
}

/// Query parameters the provider redirected back with
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    /// Provider key from the path
    pub provider: String,

    /// Authorization code
    pub code: Option<String>,

    /// Returned state
    pub state: Option<String>,

    /// Provider error code (e.g. `access_denied`)
    pub error: Option<String>,

    /// Provider error description
    pub error_description: Option<String>,

    /// Client address for rate limiting
    pub client_addr: String,

    /// User of the session presenting the callback, if signed in.
    ///
    /// A link flow only completes for the user who started it.
    pub session_user: Option<Uuid>,
}

/// Result of a successful callback or manual-link completion
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    /// Authenticated (or linking) user
    pub user_id: Uuid,

    /// The identity used or created
    pub identity: LinkedIdentity,

    /// Login or link
    pub intent: Intent,

    /// A new local user was created
    pub created_user: bool,

    /// A new identity was attached to an existing user by verified email
    pub auto_linked: bool,

    /// The identity did not exist before this flow
    pub new_identity: bool,

    /// Session, for login intents
    pub session: Option<SessionHandle>,
}

/// Result of a background refresh sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Tokens inspected
    pub scanned: usize,

    /// Tokens refreshed
    pub refreshed: usize,

    /// Tokens left alone (not due, no refresh token, or awaiting re-auth)
    pub skipped: usize,

    /// Refresh attempts that failed
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: Option<u64>) -> StoredToken {
        StoredToken {
            identity_id: Uuid::new_v4(),
            access_token: vec![1, 2, 3],
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
            expires_at,
            updated_at: 0,
        }
    }

    #[test]
    fn test_expires_within_margin() {
        let now = 10_000;
        assert!(token(Some(now + 120)).expires_within(300, now));
        assert!(!token(Some(now + 301)).expires_within(300, now));
        assert!(token(Some(now)).is_expired(now));
        assert!(!token(None).expires_within(u64::MAX, now));
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let pending = PendingAuthorization {
            code_verifier: "verifier-secret".to_string(),
            provider: "google".to_string(),
            intent: Intent::Login,
            created_at: 0,
            expires_at: 600,
        };
        assert!(!format!("{:?}", pending).contains("verifier-secret"));

        let session = SessionHandle {
            token: "session-secret".to_string(),
            expires_at: 0,
        };
        assert!(!format!("{:?}", session).contains("session-secret"));
    }

    #[test]
    fn test_intent_names() {
        assert_eq!(Intent::Login.as_str(), "login");
        assert_eq!(
            Intent::Link {
                user_id: Uuid::new_v4()
            }
            .as_str(),
            "link"
        );
    }
}
