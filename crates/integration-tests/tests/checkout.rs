//! Checkout sessions: shipping options, relay points and order placement.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;

use cardtrade_client::auth::Identity;
use cardtrade_client::checkout::CheckoutSession;
use cardtrade_client::{ClientError, Services};
use cardtrade_core::cart::Cart;
use cardtrade_core::checkout::{CheckoutBlocker, CheckoutError};
use cardtrade_core::filter::MarketplaceQuery;
use cardtrade_core::shipping::{PostalCode, ShippingMethod};
use cardtrade_core::{CartItemId, Email, ExternalUid, Price};
use cardtrade_integration_tests::fixtures::{ONDINE_EMAIL, SACHA_EMAIL};
use cardtrade_integration_tests::{StubBackend, StubState};

async fn signed_in(email: &str) -> (StubBackend, Services) {
    let backend = StubBackend::start(StubState::seeded()).await.unwrap();
    let services = Services::new(backend.config().unwrap()).unwrap();
    services
        .accounts()
        .identity_changed(Some(Identity {
            uid: ExternalUid::parse("uid-test").unwrap(),
            email: Email::parse(email).unwrap(),
        }))
        .await;
    (backend, services)
}

/// Cart holding the given marketplace listings.
async fn cart_of(services: &Services, listing_ids: &[i64]) -> Cart {
    let listings = services
        .api()
        .search_listings(&MarketplaceQuery::default())
        .await
        .unwrap();
    let mut cart = Cart::new();
    for (n, id) in (1..).zip(listing_ids) {
        let listing = listings.iter().find(|l| l.id.as_i64() == *id).unwrap();
        cart.add(listing.to_cart_line(CartItemId::new(n), Utc::now()).unwrap())
            .unwrap();
    }
    cart
}

async fn session(services: &Services, listing_ids: &[i64]) -> CheckoutSession {
    let cart = cart_of(services, listing_ids).await;
    services.checkout(cart).await.unwrap()
}

fn euros(s: &str) -> Price {
    Price::new(Decimal::from_str(s).unwrap())
}

#[tokio::test]
async fn test_flat_rate_checkout() {
    let (backend, services) = signed_in(SACHA_EMAIL).await;
    let mut session = session(&services, &[12]).await;

    assert_eq!(session.checkout().total(), euros("12.50"));
    assert_eq!(
        session.checkout().readiness(),
        Err(CheckoutBlocker::NoShippingOption)
    );

    session.checkout_mut().select_option("colissimo").unwrap();
    assert_eq!(session.checkout().total(), euros("18.40"));
    assert!(session.checkout().can_checkout());

    let redirect = session.submit().await.unwrap();
    assert_eq!(redirect.redirect_url.as_str(), "https://pay.example.com/checkout/1");
    assert_eq!(redirect.order_id, Some(1));

    let data = backend.state().data().await;
    let order = &data.orders[0];
    assert_eq!(order["user_id"], 7);
    assert_eq!(order["listing_ids"], serde_json::json!([12]));
    assert_eq!(order["shipping_option_id"], "colissimo");
    assert_eq!(order["shipping_address"]["city"], "Marseille");
    assert_eq!(order["shipping_address"]["type"], "colissimo");
}

#[tokio::test]
async fn test_relay_point_checkout() {
    let (backend, services) = signed_in(SACHA_EMAIL).await;
    let mut session = session(&services, &[12, 13]).await;

    session.checkout_mut().select_option("relay").unwrap();
    assert_eq!(
        session.checkout().readiness(),
        Err(CheckoutBlocker::RelayPointNotChosen)
    );
    assert_eq!(session.checkout().total(), euros("19.99"));

    session.checkout_mut().set_postal_code("69002");
    let found = session.search_relay_points().await.unwrap();
    assert_eq!(found, 2);

    let checkout = session.checkout();
    let displayed: Vec<&str> = checkout
        .displayed_options()
        .iter()
        .map(|o| o.id.as_str())
        .collect();
    assert_eq!(displayed, ["colissimo", "3", "PR-1", "PR-2"]);
    assert_eq!(checkout.selected_option().unwrap().id, "PR-1");
    assert!(checkout.can_checkout());

    // A point without a postal code in its description takes the searched one.
    assert_eq!(
        checkout.displayed_options()[3].method,
        ShippingMethod::RelayPoint {
            postal_code: PostalCode::parse("69002").unwrap()
        }
    );

    session.submit().await.unwrap();
    let data = backend.state().data().await;
    let address = &data.orders[0]["shipping_address"];
    assert_eq!(address["address"], "12 Rue Mercière, 69002 Lyon");
    assert_eq!(address["postal_code"], "69002");
    assert_eq!(address["city"], "Tabac du Centre");
    assert_eq!(address["country"], "FRANCE");
    assert_eq!(data.orders[0]["total"], "19.99");
}

#[tokio::test]
async fn test_postal_code_change_clears_point() {
    let (_backend, services) = signed_in(SACHA_EMAIL).await;
    let mut session = session(&services, &[12]).await;

    session.checkout_mut().set_postal_code("69002");
    session.search_relay_points().await.unwrap();
    assert!(session.checkout().can_checkout());

    session.checkout_mut().set_postal_code("6900");
    assert!(session.checkout().selected_option().is_none());
    assert_eq!(session.checkout().displayed_options().len(), 3);
    assert!(matches!(
        session.search_relay_points().await,
        Err(ClientError::Checkout(CheckoutError::InvalidPostalCode(_)))
    ));
}

#[tokio::test]
async fn test_empty_relay_search_falls_back_to_category() {
    let (_backend, services) = signed_in(SACHA_EMAIL).await;
    let mut session = session(&services, &[12]).await;

    session.checkout_mut().set_postal_code("75001");
    assert_eq!(session.search_relay_points().await.unwrap(), 0);

    let checkout = session.checkout();
    assert_eq!(checkout.displayed_options().len(), 3);
    assert_eq!(checkout.selected_option().unwrap().id, "relay");
    assert_eq!(
        checkout.readiness(),
        Err(CheckoutBlocker::RelayPointNotChosen)
    );
}

#[tokio::test]
async fn test_incomplete_profile_blocks_flat_rate() {
    let (backend, services) = signed_in(ONDINE_EMAIL).await;
    let mut session = session(&services, &[12]).await;

    session.checkout_mut().select_option("colissimo").unwrap();
    assert!(matches!(
        session.checkout().readiness(),
        Err(CheckoutBlocker::IncompleteAddress { .. })
    ));
    assert!(matches!(
        session.submit().await,
        Err(ClientError::Checkout(CheckoutError::Blocked(
            CheckoutBlocker::IncompleteAddress { .. }
        )))
    ));
    assert!(backend.state().data().await.orders.is_empty());
}

#[tokio::test]
async fn test_shipping_options_are_cached() {
    let (backend, services) = signed_in(SACHA_EMAIL).await;

    let first = services.api().shipping_options().await.unwrap();
    let second = services.api().shipping_options().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[1].method, ShippingMethod::RelayCategory);
    let fetched = backend
        .state()
        .data()
        .await
        .requests
        .iter()
        .filter(|r| r.as_str() == "/shipping-options")
        .count();
    assert_eq!(fetched, 1);
}

#[tokio::test]
async fn test_checkout_without_account_is_refused() {
    let (_backend, services) = signed_in("inconnu@exemple.fr").await;

    assert!(matches!(
        services.checkout(Cart::new()).await,
        Err(ClientError::NotSignedIn)
    ));
}
