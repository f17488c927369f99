//! Authorization initiation tests.

use super::helpers::*;
use crate::*;
use std::collections::HashSet;
use zero_link_crypto::{pkce_challenge, verify_pkce};

fn request(provider: &str, client_addr: &str) -> InitiateRequest {
    InitiateRequest {
        provider: provider.to_string(),
        intent: Intent::Login,
        client_addr: client_addr.to_string(),
    }
}

#[tokio::test]
async fn test_initiate_returns_pkce_authorization_url() {
    let h = harness();

    let redirect = h
        .service
        .initiate_at(request("fakeid", CLIENT), NOW)
        .await
        .unwrap();
    let url = &redirect.authorization_url;

    assert!(url.starts_with("https://fakeid.example/authorize?"));
    assert_eq!(query_param(url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(url, "code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(
        query_param(url, "redirect_uri").as_deref(),
        Some("https://app.example/auth/oauth/fakeid/callback")
    );
    assert!(query_param(url, "state").unwrap().len() >= 43);
    assert_eq!(redirect.expires_at, NOW + PENDING_AUTHORIZATION_TTL);
}

#[tokio::test]
async fn test_callback_presents_verifier_matching_challenge() {
    let h = harness();

    let redirect = h
        .service
        .initiate_at(request("fakeid", CLIENT), NOW)
        .await
        .unwrap();
    let state = query_param(&redirect.authorization_url, "state").unwrap();
    let challenge = query_param(&redirect.authorization_url, "code_challenge").unwrap();

    h.callback(&state, NOW + 5).await.unwrap();

    let verifier = h.provider.last_verifier().unwrap();
    assert!((43..=128).contains(&verifier.len()));
    assert_eq!(pkce_challenge(&verifier), challenge);
    assert!(verify_pkce(&verifier, &challenge));
}

#[tokio::test]
async fn test_states_are_unique() {
    let h = harness();
    let mut states = HashSet::new();

    for _ in 0..25 {
        states.insert(h.start(Intent::Login, NOW).await);
    }

    assert_eq!(states.len(), 25);
}

#[tokio::test]
async fn test_unknown_and_disabled_providers_are_rejected() {
    let h = harness();

    let unknown = h.service.initiate_at(request("nope", CLIENT), NOW).await;
    assert!(matches!(unknown, Err(OAuthError::UnknownProvider(_))));

    let disabled = h.service.initiate_at(request("dormant", CLIENT), NOW).await;
    let error = disabled.unwrap_err();
    assert!(matches!(error, OAuthError::ProviderDisabled(_)));
    assert_eq!(error.code(), "unknown_provider");
}

#[tokio::test]
async fn test_initiation_is_audited() {
    let h = harness();
    h.start(Intent::Login, NOW).await;

    assert!(h.audit.events().iter().any(|event| matches!(
        event,
        AuditEvent::AuthorizationInitiated { provider, intent: "login", client_addr }
            if provider == "fakeid" && client_addr == CLIENT
    )));
}

#[tokio::test]
async fn test_initiate_rate_limited_per_client() {
    let h = harness_with(EngineConfig::default());

    for _ in 0..10 {
        h.service
            .initiate_at(request("fakeid", CLIENT), NOW)
            .await
            .unwrap();
    }

    let limited = h.service.initiate_at(request("fakeid", CLIENT), NOW + 1).await;
    match limited {
        Err(OAuthError::RateLimited {
            retry_after_seconds,
        }) => assert!((1..=60).contains(&retry_after_seconds)),
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert!(h
        .audit
        .events()
        .iter()
        .any(|event| matches!(event, AuditEvent::RateLimitExceeded { endpoint: "initiate", .. })));

    // Other clients and the next window are unaffected
    assert!(h
        .service
        .initiate_at(request("fakeid", "198.51.100.1"), NOW + 1)
        .await
        .is_ok());
    assert!(h
        .service
        .initiate_at(request("fakeid", CLIENT), NOW + 61)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_purge_removes_abandoned_authorizations() {
    let h = harness();
    h.start(Intent::Login, NOW).await;
    let live = h.start(Intent::Login, NOW + 500).await;

    let purged = h
        .service
        .purge_expired_pending_at(NOW + PENDING_AUTHORIZATION_TTL + 1)
        .await
        .unwrap();

    assert_eq!(purged, 1);
    assert!(h.callback(&live, NOW + 601).await.is_ok());
}
