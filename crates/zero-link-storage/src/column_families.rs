//! RocksDB column family definitions.

/// Pending authorizations: state_token → PendingAuthorization (TTL: 10 min)
pub const CF_PENDING_AUTHORIZATIONS: &str = "pending_authorizations";

/// Pending manual links: ticket → PendingManualLink (TTL: 10 min)
pub const CF_PENDING_MANUAL_LINKS: &str = "pending_manual_links";

/// Linked identities: identity_id → LinkedIdentity
pub const CF_LINKED_IDENTITIES: &str = "linked_identities";

/// Provider subject index: (provider, subject) → identity_id
pub const CF_LINKED_IDENTITIES_BY_SUBJECT: &str = "linked_identities_by_subject";

/// Linked identities by user: (user_id, identity_id) → ()
pub const CF_LINKED_IDENTITIES_BY_USER: &str = "linked_identities_by_user";

/// Stored provider tokens: identity_id → StoredToken
pub const CF_STORED_TOKENS: &str = "stored_tokens";

/// Local users: user_id → UserRecord
pub const CF_USERS: &str = "users";

/// Local users by normalized email: email → user_id
pub const CF_USERS_BY_EMAIL: &str = "users_by_email";

/// Sessions: token_hash → SessionRecord
pub const CF_SESSIONS: &str = "sessions";

/// Get all column family names
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        CF_PENDING_AUTHORIZATIONS,
        CF_PENDING_MANUAL_LINKS,
        CF_LINKED_IDENTITIES,
        CF_LINKED_IDENTITIES_BY_SUBJECT,
        CF_LINKED_IDENTITIES_BY_USER,
        CF_STORED_TOKENS,
        CF_USERS,
        CF_USERS_BY_EMAIL,
        CF_SESSIONS,
    ]
}
