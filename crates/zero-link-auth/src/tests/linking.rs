//! Account linker tests.

use super::helpers::*;
use crate::*;
use zero_link_policy::{RateLimitConfig, RateLimitRule};

#[tokio::test]
async fn test_first_login_creates_user_and_session() {
    let h = harness();
    h.provider
        .set_profile(profile("p-new", Some("new@example.com"), true));

    let outcome = h.login(NOW).await.unwrap();

    assert!(outcome.created_user);
    assert!(!outcome.auto_linked);
    assert_eq!(outcome.identity.subject, "p-new");
    assert_eq!(outcome.identity.provider, "fakeid");
    assert!(outcome.session.is_some());
    assert_eq!(h.sessions.established(), vec![outcome.user_id]);
    assert_eq!(h.users.count(), 1);

    let events = h.audit.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, AuditEvent::LoginSucceeded { created_user: true, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, AuditEvent::IdentityLinked { .. })));
}

#[tokio::test]
async fn test_repeated_login_is_idempotent() {
    let h = harness();

    let first = h.login(NOW).await.unwrap();
    let second = h.login(NOW + 120).await.unwrap();

    assert_eq!(first.user_id, second.user_id);
    assert_eq!(first.identity.identity_id, second.identity.identity_id);
    assert!(!second.created_user);
    assert!(!second.new_identity);
    assert_eq!(second.identity.last_login_at, NOW + 120);

    let identities = h.service.list_identities(first.user_id).await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(h.users.count(), 1);
}

#[tokio::test]
async fn test_returning_user_needs_no_email() {
    let h = harness();
    let first = h.login(NOW).await.unwrap();

    h.provider.set_profile(profile("subject-1", None, false));
    let second = h.login(NOW + 60).await.unwrap();

    assert_eq!(second.user_id, first.user_id);
    assert_eq!(second.identity.email.as_deref(), Some("someone@example.com"));
}

#[tokio::test]
async fn test_verified_email_auto_links_existing_user() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider
        .set_profile(profile("p1", Some("alice@example.com"), true));

    let outcome = h.login(NOW).await.unwrap();

    assert_eq!(outcome.user_id, alice);
    assert!(outcome.auto_linked);
    assert!(!outcome.created_user);
    assert_eq!(outcome.identity.subject, "p1");
    assert_eq!(h.sessions.established(), vec![alice]);
    assert_eq!(h.users.count(), 1);

    let identities = h.service.list_identities(alice).await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].provider, "fakeid");
}

#[tokio::test]
async fn test_email_match_is_case_insensitive() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider
        .set_profile(profile("p1", Some("Alice@Example.com"), true));

    let outcome = h.login(NOW).await.unwrap();

    assert_eq!(outcome.user_id, alice);
}

#[tokio::test]
async fn test_unverified_email_collision_requires_manual_link() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider
        .set_profile(profile("p1", Some("alice@example.com"), false));

    let result = h.login(NOW).await;

    let ticket = match result {
        Err(OAuthError::ManualLinkRequired { ticket, email }) => {
            assert_eq!(email, "alice@example.com");
            ticket
        }
        other => panic!("expected ManualLinkRequired, got {:?}", other),
    };
    assert!(h.service.list_identities(alice).await.unwrap().is_empty());
    assert!(h.sessions.established().is_empty());

    let outcome = h
        .service
        .complete_manual_link_at(&ticket, alice, NOW + 60)
        .await
        .unwrap();
    assert_eq!(outcome.user_id, alice);
    assert!(outcome.session.is_some());
    assert_eq!(h.service.list_identities(alice).await.unwrap().len(), 1);

    // The paused tokens were kept and are readable for the new identity
    let access = h
        .service
        .get_valid_access_token_at(outcome.identity.identity_id, NOW + 60)
        .await
        .unwrap();
    assert_eq!(access.token.as_str(), "access-1");

    let reused = h
        .service
        .complete_manual_link_at(&ticket, alice, NOW + 61)
        .await;
    assert!(matches!(reused, Err(OAuthError::InvalidManualLinkTicket)));
}

#[tokio::test]
async fn test_manual_link_ticket_bound_to_email_owner() {
    let h = harness();
    h.users.add_user("alice@example.com", true);
    let mallory = h.users.add_user("mallory@example.com", true);
    h.provider
        .set_profile(profile("p1", Some("alice@example.com"), false));

    let ticket = match h.login(NOW).await {
        Err(OAuthError::ManualLinkRequired { ticket, .. }) => ticket,
        other => panic!("expected ManualLinkRequired, got {:?}", other),
    };

    let result = h
        .service
        .complete_manual_link_at(&ticket, mallory, NOW + 10)
        .await;

    assert!(matches!(result, Err(OAuthError::InvalidManualLinkTicket)));
    assert!(h.service.list_identities(mallory).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_link_ticket_expires() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider
        .set_profile(profile("p1", Some("alice@example.com"), false));

    let ticket = match h.login(NOW).await {
        Err(OAuthError::ManualLinkRequired { ticket, .. }) => ticket,
        other => panic!("expected ManualLinkRequired, got {:?}", other),
    };

    let result = h
        .service
        .complete_manual_link_at(&ticket, alice, NOW + MANUAL_LINK_TTL + 1)
        .await;

    assert!(matches!(result, Err(OAuthError::InvalidManualLinkTicket)));
}

#[tokio::test]
async fn test_manual_link_email_lookup_leaves_ticket_usable() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider
        .set_profile(profile("p1", Some("alice@example.com"), false));

    let ticket = match h.login(NOW).await {
        Err(OAuthError::ManualLinkRequired { ticket, .. }) => ticket,
        other => panic!("expected ManualLinkRequired, got {:?}", other),
    };

    let email = h.service.manual_link_email_at(&ticket, NOW + 10).await.unwrap();
    assert_eq!(email, "alice@example.com");

    let unknown = h.service.manual_link_email_at("no-such-ticket", NOW + 10).await;
    assert!(matches!(unknown, Err(OAuthError::InvalidManualLinkTicket)));
    let expired = h
        .service
        .manual_link_email_at(&ticket, NOW + MANUAL_LINK_TTL + 1)
        .await;
    assert!(matches!(expired, Err(OAuthError::InvalidManualLinkTicket)));

    let outcome = h
        .service
        .complete_manual_link_at(&ticket, alice, NOW + 20)
        .await
        .unwrap();
    assert_eq!(outcome.user_id, alice);
}

#[tokio::test]
async fn test_credential_checks_are_rate_limited() {
    let h = harness_with(EngineConfig {
        rate_limits: RateLimitConfig {
            credentials: RateLimitRule::per_minute(2),
            ..RateLimitConfig::default()
        },
        ..EngineConfig::default()
    });

    h.service.throttle_credentials_at(CLIENT, NOW).await.unwrap();
    h.service.throttle_credentials_at(CLIENT, NOW).await.unwrap();
    let third = h.service.throttle_credentials_at(CLIENT, NOW + 1).await;

    assert!(matches!(
        third,
        Err(OAuthError::RateLimited { retry_after_seconds: 59 })
    ));
    assert!(h
        .audit
        .events()
        .iter()
        .any(|e| matches!(e, AuditEvent::RateLimitExceeded { endpoint: "credentials", .. })));
    // Other clients keep their own budget
    assert!(h.service.throttle_credentials_at("198.51.100.1", NOW + 1).await.is_ok());
}

#[tokio::test]
async fn test_link_intent_attaches_without_new_session() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider
        .set_profile(profile("p-link", Some("other@example.com"), false));

    let outcome = h.link(alice, NOW).await.unwrap();

    assert_eq!(outcome.user_id, alice);
    assert!(outcome.session.is_none());
    assert!(h.sessions.established().is_empty());
    assert_eq!(h.users.count(), 1);
    assert!(h
        .audit
        .events()
        .iter()
        .any(|e| matches!(e, AuditEvent::IdentityLinked { user_id, .. } if *user_id == alice)));
}

#[tokio::test]
async fn test_link_completes_only_for_initiating_user() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    let mallory = h.users.add_user("mallory@example.com", true);
    h.provider.set_profile(profile("p-mallory", None, false));

    // Another user's browser, or no session at all, cannot finish the flow
    let state = h.start(Intent::Link { user_id: mallory }, NOW).await;
    let hijacked = h.callback_as("fakeid", &state, Some(alice), NOW + 5).await;
    assert!(matches!(hijacked, Err(OAuthError::InvalidOrExpiredState)));

    let state = h.start(Intent::Link { user_id: mallory }, NOW).await;
    let anonymous = h.callback_as("fakeid", &state, None, NOW + 5).await;
    assert!(matches!(anonymous, Err(OAuthError::InvalidOrExpiredState)));

    assert!(h.service.list_identities(alice).await.unwrap().is_empty());
    assert!(h.service.list_identities(mallory).await.unwrap().is_empty());
    // Rejected before any code exchange
    assert!(h.provider.last_verifier().is_none());

    // The state was burned by the rejected attempt
    let replay = h.callback_as("fakeid", &state, Some(mallory), NOW + 6).await;
    assert!(matches!(replay, Err(OAuthError::InvalidOrExpiredState)));
}

#[tokio::test]
async fn test_identity_owned_by_other_user_cannot_be_linked() {
    let h = harness();
    let bob = h.users.add_user("bob@example.com", true);
    let alice = h.users.add_user("alice@example.com", true);
    h.provider.set_profile(profile("p1", None, false));

    let bob_link = h.link(bob, NOW).await.unwrap();
    let result = h.link(alice, NOW + 10).await;

    assert!(matches!(result, Err(OAuthError::AlreadyLinkedToAnotherUser)));
    assert!(h.service.list_identities(alice).await.unwrap().is_empty());

    let bob_identities = h.service.list_identities(bob).await.unwrap();
    assert_eq!(bob_identities.len(), 1);
    assert_eq!(bob_identities[0], bob_link.identity);
}

#[tokio::test]
async fn test_relinking_own_identity_is_accepted() {
    let h = harness();
    let alice = h.users.add_user("alice@example.com", true);
    h.provider.set_profile(profile("p1", None, false));

    let first = h.link(alice, NOW).await.unwrap();
    let second = h.link(alice, NOW + 10).await.unwrap();

    assert_eq!(first.identity.identity_id, second.identity.identity_id);
    assert_eq!(h.service.list_identities(alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_logins_create_one_identity() {
    let h = std::sync::Arc::new(harness());
    h.provider
        .set_profile(profile("p-race", Some("race@example.com"), true));
    let state_a = h.start(Intent::Login, NOW).await;
    let state_b = h.start(Intent::Login, NOW).await;

    let a = {
        let h = std::sync::Arc::clone(&h);
        tokio::spawn(async move { h.callback(&state_a, NOW + 1).await })
    };
    let b = {
        let h = std::sync::Arc::clone(&h);
        tokio::spawn(async move { h.callback(&state_b, NOW + 1).await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a.identity.identity_id, b.identity.identity_id);
    assert_eq!(a.user_id, b.user_id);
    assert_eq!(h.service.list_identities(a.user_id).await.unwrap().len(), 1);
}
