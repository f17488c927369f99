pub mod account;
pub mod health;
pub mod oauth;


use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// HTTP surface of the OAuth engine
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Browser flows
        .route("/auth/oauth/:provider/login", get(oauth::login))
        .route("/auth/oauth/:provider/callback", get(oauth::callback))
        .route("/auth/oauth/:provider/link", get(oauth::link))
        // API
        .route("/auth/oauth/providers", get(oauth::list_providers))
        .route("/auth/oauth/identities", get(oauth::list_identities))
        .route("/auth/oauth/confirm-link", post(oauth::confirm_link))
        .route("/auth/oauth/:provider/unlink", post(oauth::unlink))
        .route("/auth/password", post(account::set_password))
        .layer(from_fn_with_state(state.clone(), request_id_middleware))
        // Query strings carry codes and state, so spans record the path only
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::debug_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            },
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
