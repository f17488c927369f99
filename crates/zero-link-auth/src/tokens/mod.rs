//! Provider token storage and refresh.

mod refresher;
mod store;

pub use refresher::TokenRefresher;
pub use store::TokenStore;

/// AAD field name for access tokens
pub(crate) const ACCESS_FIELD: &str = "access";

/// AAD field name for refresh tokens
pub(crate) const REFRESH_FIELD: &str = "refresh";
