use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, Response},
    middleware::Next,
};
use std::sync::Arc;
use std::time::Instant;

use crate::request_context::{direct_ip, extract_client_ip};
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Tags every request with an `X-Request-ID` (generated when absent) and
/// logs start and completion with timing.
pub async fn request_id_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&request_id).ok();
    match &header_value {
        Some(value) => {
            req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        }
        None => tracing::warn!("Failed to create header value for request ID"),
    }

    let client_addr = extract_client_ip(
        req.headers(),
        direct_ip(req.extensions()),
        &state.config.trusted_proxies,
    );

    // Query strings carry OAuth codes and state; only the path is logged
    tracing::info!(
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        client_addr = %client_addr,
        "Request started"
    );

    let start = Instant::now();
    let mut response = next.run(req).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    tracing::info!(
        request_id = %request_id,
        status = %response.status(),
        elapsed_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}
