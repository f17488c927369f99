//! OAuth engine error types.

use thiserror::Error;
use uuid::Uuid;
use zero_link_crypto::CryptoError;
use zero_link_policy::PolicyError;
use zero_link_providers::ProviderError;

/// OAuth engine errors
#[derive(Debug, Error)]
pub enum OAuthError {
    /// No provider is registered under this key
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider exists but is disabled
    #[error("Provider disabled: {0}")]
    ProviderDisabled(String),

    /// State missing, expired, already consumed, or issued for another provider
    #[error("Invalid or expired state")]
    InvalidOrExpiredState,

    /// User declined consent (or the provider reported another error)
    #[error("Authorization denied by provider: {error}")]
    AuthorizationDenied {
        /// Provider error code, e.g. `access_denied`
        error: String,
        /// Optional provider description
        description: Option<String>,
    },

    /// Token endpoint rejected the authorization code
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// User-info endpoint failed
    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    /// Provider timed out or is down
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider did not supply an email and the flow needs one
    #[error("Email required")]
    EmailRequired,

    /// Email belongs to a local account but the provider did not verify it
    #[error("Manual link required for {email}")]
    ManualLinkRequired {
        /// Single-use ticket for `complete_manual_link`
        ticket: String,
        /// The colliding email
        email: String,
    },

    /// The provider identity belongs to a different local user
    #[error("Identity already linked to another user")]
    AlreadyLinkedToAnotherUser,

    /// Unlinking would leave the user without any way to sign in
    #[error("Cannot remove last authentication method")]
    CannotRemoveLastAuthMethod,

    /// Stored token ciphertext could not be decrypted
    #[error("Token decryption failed")]
    DecryptionFailed,

    /// Tokens for the identity are unusable; the user must sign in again
    #[error("Re-authentication required for identity {0}")]
    ReauthenticationRequired(Uuid),

    /// Too many attempts from this client
    #[error("Rate limited; retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds until the window resets
        retry_after_seconds: u64,
    },

    /// No linked identity matches
    #[error("Linked identity not found")]
    IdentityNotFound,

    /// No local user matches
    #[error("User not found")]
    UserNotFound,

    /// Manual-link ticket unknown, expired, or not valid for this user
    #[error("Invalid manual link ticket")]
    InvalidManualLinkTicket,

    /// User store collaborator failed
    #[error("User store error: {0}")]
    UserStore(String),

    /// Session collaborator failed
    #[error("Session error: {0}")]
    Session(String),

    /// Misconfigured provider or engine
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] zero_link_storage::StorageError),

    /// Crypto error other than decryption
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    /// Persisted state contradicts an engine invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl OAuthError {
    /// Machine-safe code for redirects and API responses.
    ///
    /// Unknown and disabled providers share one code so the response does not
    /// reveal deployment configuration.
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::UnknownProvider(_) | OAuthError::ProviderDisabled(_) => "unknown_provider",
            OAuthError::InvalidOrExpiredState => "invalid_state",
            OAuthError::AuthorizationDenied { .. } => "authorization_denied",
            OAuthError::TokenExchangeFailed(_) => "token_exchange_failed",
            OAuthError::ProfileFetchFailed(_) => "profile_fetch_failed",
            OAuthError::ProviderUnavailable(_) => "provider_unavailable",
            OAuthError::EmailRequired => "email_required",
            OAuthError::ManualLinkRequired { .. } => "manual_link_required",
            OAuthError::AlreadyLinkedToAnotherUser => "already_linked",
            OAuthError::CannotRemoveLastAuthMethod => "last_auth_method",
            OAuthError::DecryptionFailed => "reauthentication_required",
            OAuthError::ReauthenticationRequired(_) => "reauthentication_required",
            OAuthError::RateLimited { .. } => "rate_limited",
            OAuthError::IdentityNotFound => "identity_not_found",
            OAuthError::UserNotFound => "user_not_found",
            OAuthError::InvalidManualLinkTicket => "invalid_link_ticket",
            OAuthError::UserStore(_)
            | OAuthError::Session(_)
            | OAuthError::Configuration(_)
            | OAuthError::Storage(_)
            | OAuthError::Crypto(_)
            | OAuthError::InvariantViolation(_) => "internal_error",
        }
    }

    /// Upstream or throttling failures the user can simply retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OAuthError::TokenExchangeFailed(_)
                | OAuthError::ProfileFetchFailed(_)
                | OAuthError::ProviderUnavailable(_)
                | OAuthError::RateLimited { .. }
        )
    }

    /// Errors that indicate a bug or infrastructure failure rather than user action
    pub fn is_internal(&self) -> bool {
        self.code() == "internal_error"
    }
}

impl From<CryptoError> for OAuthError {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::DecryptionFailed | CryptoError::CiphertextTooShort(_) => {
                OAuthError::DecryptionFailed
            }
            other => OAuthError::Crypto(other),
        }
    }
}

impl From<ProviderError> for OAuthError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::UnknownProvider(key) => OAuthError::UnknownProvider(key),
            ProviderError::ProviderDisabled(key) => OAuthError::ProviderDisabled(key),
            ProviderError::TokenExchangeFailed(msg) => OAuthError::TokenExchangeFailed(msg),
            ProviderError::ProfileFetchFailed(msg) => OAuthError::ProfileFetchFailed(msg),
            ProviderError::RefreshRejected(msg) => OAuthError::TokenExchangeFailed(msg),
            ProviderError::Unavailable(msg) => OAuthError::ProviderUnavailable(msg),
            ProviderError::ConfigInvalid(msg) => OAuthError::Configuration(msg),
        }
    }
}

impl From<PolicyError> for OAuthError {
    fn from(error: PolicyError) -> Self {
        match error {
            PolicyError::RateLimited {
                retry_after_seconds,
                ..
            } => OAuthError::RateLimited {
                retry_after_seconds,
            },
        }
    }
}

/// Result type for OAuth engine operations
pub type Result<T> = std::result::Result<T, OAuthError>;
