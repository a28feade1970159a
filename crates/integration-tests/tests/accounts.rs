//! Account id resolution against the stub backend.

#![allow(clippy::unwrap_used)]

use std::time::Instant;

use cardtrade_client::Services;
use cardtrade_client::auth::Identity;
use cardtrade_core::{AccountId, Email, ExternalUid};
use cardtrade_integration_tests::fixtures::{ONDINE_EMAIL, SACHA_EMAIL, SACHA_ID};
use cardtrade_integration_tests::{StubBackend, StubState};

fn identity(uid: &str, email: &str) -> Identity {
    Identity {
        uid: ExternalUid::parse(uid).unwrap(),
        email: Email::parse(email).unwrap(),
    }
}

async fn setup() -> (StubBackend, Services) {
    let backend = StubBackend::start(StubState::seeded()).await.unwrap();
    let services = Services::new(backend.config().unwrap()).unwrap();
    (backend, services)
}

#[tokio::test]
async fn test_resolves_registered_email() {
    let (backend, services) = setup().await;
    services
        .accounts()
        .identity_changed(Some(identity("uid-sacha", SACHA_EMAIL)))
        .await;

    let id = services.accounts().ensure_account_id().await;
    assert_eq!(id, Some(AccountId::new(SACHA_ID)));

    // Cached for the session.
    services.accounts().ensure_account_id().await;
    let data = backend.state().data().await;
    assert_eq!(data.lookups.get(SACHA_EMAIL), Some(&1));
}

#[tokio::test]
async fn test_retries_until_backend_row_exists() {
    let (backend, services) = setup().await;
    backend
        .state()
        .data()
        .await
        .lookup_failures
        .insert(SACHA_EMAIL.to_string(), 4);
    services
        .accounts()
        .identity_changed(Some(identity("uid-sacha", SACHA_EMAIL)))
        .await;

    let started = Instant::now();
    let id = services.accounts().ensure_account_id().await;

    assert_eq!(id, Some(AccountId::new(SACHA_ID)));
    assert_eq!(backend.state().data().await.lookups.get(SACHA_EMAIL), Some(&5));
    // 10 + 20 + 40 + 80 ms of backoff.
    assert!(started.elapsed().as_millis() >= 150);
}

#[tokio::test]
async fn test_unknown_email_gives_up_after_five_attempts() {
    let (backend, services) = setup().await;
    services
        .accounts()
        .identity_changed(Some(identity("uid-ghost", "personne@nulle-part.fr")))
        .await;

    assert_eq!(services.accounts().ensure_account_id().await, None);
    assert_eq!(
        backend
            .state()
            .data()
            .await
            .lookups
            .get("personne@nulle-part.fr"),
        Some(&5)
    );
}

#[tokio::test]
async fn test_switching_identity_resolves_new_account() {
    let (backend, services) = setup().await;
    let accounts = services.accounts();

    accounts
        .identity_changed(Some(identity("uid-sacha", SACHA_EMAIL)))
        .await;
    assert_eq!(
        accounts.ensure_account_id().await,
        Some(AccountId::new(SACHA_ID))
    );

    accounts
        .identity_changed(Some(identity("uid-ondine", ONDINE_EMAIL)))
        .await;
    assert_eq!(accounts.account_id().await, None);
    assert_eq!(accounts.ensure_account_id().await, Some(AccountId::new(42)));

    accounts.identity_changed(None).await;
    assert_eq!(accounts.ensure_account_id().await, None);
    assert_eq!(backend.state().data().await.lookups.len(), 2);
}
