use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::AppState;

/// Client address used for rate limiting and audit records.
///
/// `X-Forwarded-For` (rightmost entry) and then `X-Real-IP` are honoured only
/// when the direct peer is a configured trusted proxy; otherwise a client
/// could pick its own rate-limit bucket.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> String {
    let Some(direct) = direct_ip else {
        tracing::warn!("No direct connection IP available for request");
        return "unknown".to_string();
    };

    if trusted_proxies.contains(&direct) {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|chain| chain.split(',').next_back());
        let real_ip = headers.get("X-Real-IP").and_then(|h| h.to_str().ok());

        for candidate in [forwarded, real_ip].into_iter().flatten() {
            let candidate = candidate.trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return candidate.to_string();
            }
        }
    }

    direct.to_string()
}

pub(crate) fn direct_ip(extensions: &axum::http::Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

/// Per-request metadata handed to the engine
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client address (connection peer or trusted forwarded address)
    pub client_addr: String,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, trusted_proxies: &[IpAddr]) -> Self {
        Self {
            client_addr: extract_client_ip(
                &parts.headers,
                direct_ip(&parts.extensions),
                trusted_proxies,
            ),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_parts(
            parts,
            &state.config.trusted_proxies,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)], peer: Option<[u8; 4]>) -> Parts {
        let mut builder = Request::builder().uri("https://app.example/auth/oauth/google/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(peer) = peer {
            parts
                .extensions
                .insert(ConnectInfo(SocketAddr::from((peer, 443))));
        }
        parts
    }

    #[test]
    fn test_trusted_proxy_uses_rightmost_forwarded_for() {
        let parts = parts(
            &[("X-Forwarded-For", "192.168.1.100, 198.51.100.4")],
            Some([10, 0, 0, 1]),
        );

        let context = RequestContext::from_parts(&parts, &["10.0.0.1".parse().unwrap()]);

        assert_eq!(context.client_addr, "198.51.100.4");
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_for() {
        let parts = parts(&[("X-Forwarded-For", "203.0.113.9")], Some([198, 51, 100, 7]));

        let context = RequestContext::from_parts(&parts, &["10.0.0.1".parse().unwrap()]);

        assert_eq!(context.client_addr, "198.51.100.7");
    }

    #[test]
    fn test_trusted_proxy_falls_back_to_real_ip() {
        let parts = parts(
            &[("X-Forwarded-For", "not-an-ip"), ("X-Real-IP", "203.0.113.9")],
            Some([10, 0, 0, 10]),
        );

        let context = RequestContext::from_parts(&parts, &["10.0.0.10".parse().unwrap()]);

        assert_eq!(context.client_addr, "203.0.113.9");
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        let context = RequestContext::from_parts(&parts(&[], None), &[]);

        assert_eq!(context.client_addr, "unknown");
    }
}
