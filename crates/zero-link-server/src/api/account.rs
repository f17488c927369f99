use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use zero_link_auth::{OAuthFlows, UserStore};

use crate::error::ApiError;
use crate::extractors::AuthenticatedUser;
use crate::request_context::RequestContext;
use crate::state::AppState;
use crate::stores::MIN_PASSWORD_LEN;

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
    /// Required when the account already has a password
    pub current_password: Option<String>,
}

/// POST /auth/password
///
/// Gives an OAuth-only account a local password, which then counts as an
/// authentication method for the unlink check.
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ctx: RequestContext,
    Json(request): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state.oauth.throttle_credentials(&ctx.client_addr).await?;

    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if state.users.has_password(user.user_id).await? {
        let current = request.current_password.as_deref().unwrap_or_default();
        if !state.users.check_password(user.user_id, current).await? {
            return Err(ApiError::Unauthorized);
        }
    }

    state
        .users
        .set_password(user.user_id, &request.password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
