use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use zero_link_auth::{
    CallbackOutcome, CallbackRequest, InitiateRequest, Intent, LinkedIdentity, OAuthError,
    OAuthFlows, SessionHandle,
};

use crate::error::ApiError;
use crate::extractors::{AuthenticatedUser, SESSION_COOKIE};
use crate::request_context::RequestContext;
use crate::state::AppState;

/// `302 Found` to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `location` with `params` appended to its query string
fn with_query(location: &str, params: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = if location.contains('?') { '&' } else { '?' };
    format!("{}{}{}", location, separator, query)
}

/// Browser-facing failure: back to the error page with a machine-safe code
fn error_redirect(state: &AppState, error: &OAuthError) -> Response {
    let mut params = vec![("error", error.code())];
    if let OAuthError::ManualLinkRequired { ticket, .. } = error {
        params.push(("ticket", ticket.as_str()));
    }
    found(&with_query(&state.config.error_redirect, &params))
}

fn session_cookie(state: &AppState, session: &SessionHandle) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .http_only(true)
        .secure(state.config.public_base_url.starts_with("https://"))
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            i64::try_from(state.config.session_ttl).unwrap_or(i64::MAX),
        ))
        .build()
}

fn with_session(state: &AppState, jar: CookieJar, outcome: &CallbackOutcome) -> CookieJar {
    match &outcome.session {
        Some(session) => jar.add(session_cookie(state, session)),
        None => jar,
    }
}

async fn start_flow(
    state: &AppState,
    provider: String,
    intent: Intent,
    ctx: RequestContext,
) -> Response {
    let request = InitiateRequest {
        provider,
        intent,
        client_addr: ctx.client_addr,
    };

    match state.oauth.initiate(request).await {
        Ok(redirect) => found(&redirect.authorization_url),
        Err(err) => error_redirect(state, &err),
    }
}

/// GET /auth/oauth/:provider/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    ctx: RequestContext,
) -> Response {
    start_flow(&state, provider, Intent::Login, ctx).await
}

/// GET /auth/oauth/:provider/link
pub async fn link(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    user: AuthenticatedUser,
    ctx: RequestContext,
) -> Response {
    let intent = Intent::Link {
        user_id: user.user_id,
    };
    start_flow(&state, provider, intent, ctx).await
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/oauth/:provider/callback
///
/// Login callbacks need no session; link callbacks only complete in the
/// session of the user who started the link.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    user: Option<AuthenticatedUser>,
    ctx: RequestContext,
    jar: CookieJar,
) -> Response {
    let request = CallbackRequest {
        provider,
        code: params.code,
        state: params.state,
        error: params.error,
        error_description: params.error_description,
        client_addr: ctx.client_addr,
        session_user: user.map(|user| user.user_id),
    };

    match state.oauth.handle_callback(request).await {
        Ok(outcome) => {
            let jar = with_session(&state, jar, &outcome);
            (jar, found(&state.config.post_login_redirect)).into_response()
        }
        Err(err) => error_redirect(&state, &err),
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderView {
    pub key: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderView>,
}

/// GET /auth/oauth/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let providers = state
        .oauth
        .registry()
        .list_enabled()
        .into_iter()
        .map(|config| ProviderView {
            key: config.key.clone(),
            display_name: config.display_name.clone(),
        })
        .collect();

    Json(ProvidersResponse { providers })
}

/// Linked identity as exposed over HTTP; tokens never leave the engine
#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub identity_id: Uuid,
    pub provider: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: u64,
    pub last_login_at: u64,
    pub reauth_required: bool,
}

impl From<LinkedIdentity> for IdentityView {
    fn from(identity: LinkedIdentity) -> Self {
        Self {
            identity_id: identity.identity_id,
            provider: identity.provider,
            email: identity.email,
            email_verified: identity.email_verified,
            display_name: identity.display_name,
            avatar_url: identity.avatar_url,
            created_at: identity.created_at,
            last_login_at: identity.last_login_at,
            reauth_required: identity.reauth_required,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IdentitiesResponse {
    pub identities: Vec<IdentityView>,
}

/// GET /auth/oauth/identities
pub async fn list_identities(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<IdentitiesResponse>, ApiError> {
    let identities = state.oauth.list_identities(user.user_id).await?;

    Ok(Json(IdentitiesResponse {
        identities: identities.into_iter().map(IdentityView::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct UnlinkResponse {
    pub removed: Vec<IdentityView>,
}

/// POST /auth/oauth/:provider/unlink
pub async fn unlink(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    user: AuthenticatedUser,
) -> Result<Json<UnlinkResponse>, ApiError> {
    let removed = state.oauth.unlink(user.user_id, &provider).await?;

    Ok(Json(UnlinkResponse {
        removed: removed.into_iter().map(IdentityView::from).collect(),
    }))
}

#[derive(Deserialize)]
pub struct ConfirmLinkRequest {
    pub ticket: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmLinkResponse {
    pub user_id: Uuid,
    pub identity: IdentityView,
}

/// POST /auth/oauth/confirm-link
///
/// Finishes a login paused on an unverified email collision once the caller
/// proves they own the existing account. The ticket is checked before the
/// password, so an invalid ticket never reveals whether a password matched.
pub async fn confirm_link(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    jar: CookieJar,
    Json(request): Json<ConfirmLinkRequest>,
) -> Result<(CookieJar, Json<ConfirmLinkResponse>), ApiError> {
    state.oauth.throttle_credentials(&ctx.client_addr).await?;

    let ticket_email = state.oauth.manual_link_email(&request.ticket).await?;
    if !ticket_email.eq_ignore_ascii_case(request.email.trim()) {
        tracing::warn!("Manual link confirmation for an email the ticket was not issued to");
        return Err(OAuthError::InvalidManualLinkTicket.into());
    }

    let user_id = state
        .users
        .verify_credentials(&ticket_email, &request.password)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Manual link confirmation with invalid credentials");
            ApiError::Unauthorized
        })?;

    let outcome = state
        .oauth
        .complete_manual_link(&request.ticket, user_id)
        .await?;
    let jar = with_session(&state, jar, &outcome);

    Ok((
        jar,
        Json(ConfirmLinkResponse {
            user_id: outcome.user_id,
            identity: outcome.identity.into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_appends_encoded_params() {
        assert_eq!(
            with_query("/login/error", &[("error", "invalid_state")]),
            "/login/error?error=invalid_state"
        );
        assert_eq!(
            with_query("/done?lang=en", &[("error", "a b"), ("ticket", "x&y")]),
            "/done?lang=en&error=a+b&ticket=x%26y"
        );
    }
}
