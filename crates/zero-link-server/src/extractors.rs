use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use uuid::Uuid;
use zero_link_auth::current_timestamp;

use crate::{error::ApiError, state::AppState};

/// Cookie carrying the session token issued by a successful login
pub const SESSION_COOKIE: &str = "zl_session";

/// Session token from `Authorization: Bearer` or, failing that, the session cookie
fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Local user behind a live session
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(ApiError::Unauthorized)?;

        let user_id = state
            .sessions
            .authenticate(&token, current_timestamp())
            .await?
            .ok_or_else(|| {
                tracing::debug!("Session token rejected");
                ApiError::Unauthorized
            })?;

        Ok(AuthenticatedUser { user_id })
    }
}
