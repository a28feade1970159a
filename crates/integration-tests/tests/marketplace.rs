//! Marketplace search, feed polling, card catalogue, publishing,
//! collections, saved cards and profile edits.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use cardtrade_client::api::ProfileUpdate;
use cardtrade_client::collection::{NewCard, Transfer};
use cardtrade_client::config::PollSettings;
use cardtrade_client::{ApiError, ClientError, Services};
use cardtrade_core::collection::{CollectionCard, CollectionError};
use cardtrade_core::filter::{CardSearchQuery, ListingKind, MarketplaceQuery, PriceBucket};
use cardtrade_core::listing::{CardDetails, DraftError, ListingDraft};
use cardtrade_core::{AccountId, CardId, CategoryId, ListingId, Price, SavedCardId};
use cardtrade_integration_tests::fixtures::{BASE_SET_CATEGORY, FAVOURITES_CATEGORY, SACHA_ID};
use cardtrade_integration_tests::{StubBackend, StubState};

async fn setup() -> (StubBackend, Services) {
    let backend = StubBackend::start(StubState::seeded()).await.unwrap();
    let mut config = backend.config().unwrap();
    config.poll = PollSettings {
        interval: Duration::from_millis(50),
        max_backoff: Duration::from_millis(200),
    };
    let services = Services::new(config).unwrap();
    (backend, services)
}

fn ids(listings: &[cardtrade_core::listing::Listing]) -> Vec<i64> {
    listings.iter().map(|l| l.id.as_i64()).collect()
}

#[tokio::test]
async fn test_unfiltered_query_uses_all_endpoint() {
    let (backend, services) = setup().await;

    let listings = services
        .marketplace_feed()
        .refresh(&MarketplaceQuery::default())
        .await
        .unwrap();

    assert_eq!(ids(&listings), [12, 13, 14, 15, 16]);
    assert_eq!(backend.state().data().await.requests, ["/marketplace/all"]);
}

#[tokio::test]
async fn test_search_sends_only_set_parameters() {
    let (backend, services) = setup().await;
    let query = MarketplaceQuery {
        text: String::new(),
        price: PriceBucket::UpTo10,
        kind: ListingKind::All,
    };

    let listings = services.marketplace_feed().refresh(&query).await.unwrap();

    assert_eq!(ids(&listings), [13]);
    assert_eq!(
        backend.state().data().await.requests,
        ["/marketplace/search?priceMin=0&priceMax=10"]
    );
}

#[tokio::test]
async fn test_text_is_rechecked_locally() {
    let (backend, services) = setup().await;
    let query = MarketplaceQuery {
        text: "  pikachu ".to_string(),
        price: PriceBucket::All,
        kind: ListingKind::Sale,
    };

    // The stub ignores `q`; the feed drops what does not match.
    let listings = services.marketplace_feed().refresh(&query).await.unwrap();

    assert_eq!(ids(&listings), [13, 16]);
    assert!(listings.iter().all(|l| l.kind == ListingKind::Sale));
    assert_eq!(
        backend.state().data().await.requests,
        ["/marketplace/search?q=pikachu&type=Vente"]
    );
}

#[tokio::test]
async fn test_listing_conversion() {
    let (_backend, services) = setup().await;
    let listings = services
        .api()
        .search_listings(&MarketplaceQuery::default())
        .await
        .unwrap();

    let dracaufeu = &listings[0];
    assert_eq!(dracaufeu.title(), "Dracaufeu (1999)");
    assert_eq!(dracaufeu.seller_id, Some(AccountId::new(42)));
    assert!(dracaufeu.is_for_sale());
    assert_eq!(listings[2].seller_id, Some(AccountId::new(42)));
    assert_eq!(listings[3].kind, ListingKind::Exchange);
    assert!(!listings[3].is_for_sale());
    assert!(!listings[4].is_for_sale());
    assert_eq!(listings[0].id, ListingId::new(12));
}

#[tokio::test]
async fn test_feed_keeps_listings_through_outage() {
    let (backend, services) = setup().await;
    let mut handle = services.marketplace_feed().watch(MarketplaceQuery::default());

    let first = handle.changed().await.unwrap();
    assert_eq!(first.listings.len(), 5);

    backend.state().data().await.fail_marketplace = true;
    let failed = loop {
        let snapshot = handle.changed().await.unwrap();
        if snapshot.consecutive_failures > 0 {
            break snapshot;
        }
    };
    assert_eq!(failed.listings.len(), 5);
    assert!(failed.last_error.is_some());

    backend.state().data().await.fail_marketplace = false;
    let recovered = loop {
        let snapshot = handle.changed().await.unwrap();
        if snapshot.consecutive_failures == 0 {
            break snapshot;
        }
    };
    assert_eq!(recovered.listings.len(), 5);
    assert!(recovered.last_error.is_none());
    handle.stop();
}

#[tokio::test]
async fn test_card_search_pagination() {
    let (backend, services) = setup().await;

    let page = services
        .api()
        .search_cards(&CardSearchQuery::new("pikachu", 1))
        .await
        .unwrap();

    assert_eq!(page.nb_pages, 2);
    assert_eq!(page.page, 1);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.items[0].id, "base1-21");
    assert_eq!(
        backend.state().data().await.requests,
        ["/cards/search?q=pikachu&page=1&limit=20"]
    );
}

#[tokio::test]
async fn test_random_cards() {
    let (_backend, services) = setup().await;

    let cards = services.api().random_cards(3).await.unwrap();

    assert_eq!(cards.len(), 3);
    assert_eq!(cards[0].name, "Lugia");
    assert_eq!(cards[0].number.as_deref(), Some("9"));
}

const SACHA: AccountId = AccountId::new(SACHA_ID);

fn dracaufeu() -> CardDetails {
    CardDetails {
        name: "Dracaufeu".to_string(),
        year: Some(1999),
        card_set: Some("Set de base".to_string()),
        number: Some("4".to_string()),
        attributes: None,
    }
}

fn card_names(cards: &[CollectionCard]) -> Vec<&str> {
    cards.iter().map(|c| c.details.name.as_str()).collect()
}

#[tokio::test]
async fn test_publish_and_withdraw_listing() {
    let (_backend, services) = setup().await;
    let api = services.api();
    assert_eq!(ids(&api.seller_listings(SACHA).await.unwrap()), [15]);

    let draft = ListingDraft {
        card_id: CardId::new(4),
        details: dracaufeu(),
        photo: None,
        kind: ListingKind::Sale,
        price: Some(Price::from_cents(1500)),
    };
    api.publish_listing(SACHA, &draft).await.unwrap();

    let listings = api.seller_listings(SACHA).await.unwrap();
    assert_eq!(ids(&listings), [15, 1001]);
    let published = &listings[1];
    assert_eq!(published.price, Some(Price::from_cents(1500)));
    assert_eq!(published.card_id, Some(CardId::new(4)));
    assert!(published.is_for_sale());

    api.delete_listing(ListingId::new(1001)).await.unwrap();
    assert_eq!(ids(&api.seller_listings(SACHA).await.unwrap()), [15]);
    assert!(
        api.delete_listing(ListingId::new(1001))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_exchange_listing_has_no_price() {
    let (backend, services) = setup().await;
    let draft = ListingDraft {
        card_id: CardId::new(4),
        details: dracaufeu(),
        photo: Some("https://img.example.com/d.jpg".to_string()),
        kind: ListingKind::Exchange,
        price: Some(Price::from_cents(1500)),
    };

    services.api().publish_listing(SACHA, &draft).await.unwrap();

    let data = backend.state().data().await;
    let body = data.listings.last().unwrap();
    assert_eq!(body["type"], "Échange");
    assert!(body["prix"].is_null());
    assert_eq!(body["user_id"], 7);
    assert_eq!(body["cards_id"], 4);
    assert_eq!(body["card_set"], "Set de base");
}

#[tokio::test]
async fn test_add_card_reuses_stored_card() {
    let (backend, services) = setup().await;
    let card = NewCard {
        details: dracaufeu(),
        kind: ListingKind::Sale,
        price: Some(Price::from_cents(2000)),
        ..NewCard::default()
    };

    let id = services.collection().add_card(SACHA, &card).await.unwrap();

    assert_eq!(id, CardId::new(4));
    assert_eq!(
        backend.state().data().await.requests,
        ["/cards/exists", "/marketplace/add"]
    );
}

#[tokio::test]
async fn test_add_unknown_card_without_listing() {
    let (backend, services) = setup().await;
    let card = NewCard {
        details: CardDetails {
            name: "Salamèche".to_string(),
            number: Some("46".to_string()),
            ..dracaufeu()
        },
        ..NewCard::default()
    };

    let id = services.collection().add_card(SACHA, &card).await.unwrap();

    assert_eq!(id, CardId::new(1001));
    let data = backend.state().data().await;
    assert_eq!(data.requests, ["/cards/exists", "/cards/add"]);
    assert_eq!(data.stored_cards.last().unwrap()["firebase_ID"], 7);
    drop(data);
    let stored = services.api().get_card(id).await.unwrap();
    assert_eq!(stored.details.name, "Salamèche");
}

#[tokio::test]
async fn test_add_card_validates_before_sending() {
    let (backend, services) = setup().await;

    let sale_without_price = NewCard {
        details: dracaufeu(),
        kind: ListingKind::Sale,
        ..NewCard::default()
    };
    assert!(matches!(
        services.collection().add_card(SACHA, &sale_without_price).await,
        Err(ClientError::Draft(DraftError::MissingPrice))
    ));

    let incomplete = NewCard {
        details: CardDetails {
            year: None,
            ..dracaufeu()
        },
        ..NewCard::default()
    };
    assert!(matches!(
        services.collection().add_card(SACHA, &incomplete).await,
        Err(ClientError::Draft(DraftError::MissingFields { .. }))
    ));
    assert!(backend.state().data().await.requests.is_empty());
}

#[tokio::test]
async fn test_get_unknown_card() {
    let (_backend, services) = setup().await;

    let mew = services.api().get_card(CardId::new(151)).await.unwrap();
    assert_eq!(mew.details.card_set.as_deref(), Some("Promo"));
    assert!(
        services
            .api()
            .get_card(CardId::new(9999))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_category_view_applies_links_then_text() {
    let (backend, services) = setup().await;
    let collection = services.collection();

    let base = collection
        .category_view(SACHA, CategoryId::new(BASE_SET_CATEGORY), "")
        .await
        .unwrap();
    assert_eq!(card_names(&base), ["Dracaufeu", "Pikachu", "Mewtwo"]);

    let favourites = collection
        .category_view(SACHA, CategoryId::new(FAVOURITES_CATEGORY), "")
        .await
        .unwrap();
    assert_eq!(card_names(&favourites), ["Pikachu", "Mew"]);
    // Rows with only `cards_id` still join their links.
    assert_eq!(favourites[1].id, CardId::new(151));

    // Every term must match, across fields.
    let found = collection
        .category_view(SACHA, CategoryId::new(BASE_SET_CATEGORY), "BASE 58")
        .await
        .unwrap();
    assert_eq!(card_names(&found), ["Pikachu"]);
    let found = collection
        .category_view(SACHA, CategoryId::new(FAVOURITES_CATEGORY), "edition 1999")
        .await
        .unwrap();
    assert_eq!(card_names(&found), ["Pikachu"]);
    let found = collection
        .category_view(SACHA, CategoryId::new(FAVOURITES_CATEGORY), "mewtwo")
        .await
        .unwrap();
    assert!(found.is_empty());

    let requests = backend.state().data().await.requests.clone();
    assert!(requests.iter().any(|r| r == "/users/7/collection"));
    assert!(requests.iter().any(|r| r == "/users/7/card-categories"));
}

#[tokio::test]
async fn test_collection_conversion() {
    let (_backend, services) = setup().await;

    let cards = services.api().collection(SACHA).await.unwrap();

    assert_eq!(card_names(&cards), ["Dracaufeu", "Pikachu", "Mewtwo", "Mew"]);
    assert_eq!(cards[0].details.attributes.as_deref(), Some("Etat: Excellent"));
    assert_eq!(cards[1].id, CardId::new(58));
    assert_eq!(cards[1].details.year, Some(1999));
    assert_eq!(cards[1].details.number.as_deref(), Some("58"));
    assert_eq!(cards[2].photo.as_deref(), Some("https://img.example.com/mewtwo.jpg"));
    assert!(services.api().collection(AccountId::new(42)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_category_edits_and_import() {
    let (backend, services) = setup().await;
    let api = services.api();
    let collection = services.collection();

    let categories = api.categories(SACHA).await.unwrap();
    let counts: Vec<(&str, u32)> = categories
        .iter()
        .map(|c| (c.name.as_str(), c.card_count))
        .collect();
    assert_eq!(counts, [("Set de base", 3), ("Favoris", 2)]);

    assert!(matches!(
        collection.create_category(SACHA, "  ").await,
        Err(ClientError::Collection(CollectionError::EmptyCategoryName))
    ));
    collection.create_category(SACHA, "  Holos ").await.unwrap();
    let holos = api.categories(SACHA).await.unwrap().pop().unwrap();
    assert_eq!(holos.name, "Holos");
    assert_eq!(holos.card_count, 0);

    assert!(matches!(
        collection.import_into_category(SACHA, holos.id, "\n  \n").await,
        Err(ClientError::Collection(CollectionError::EmptyImport))
    ));
    let added = collection
        .import_into_category(SACHA, holos.id, "249\r\n\n58\nbase1-4\n")
        .await
        .unwrap();
    assert_eq!(added, 2);
    assert_eq!(
        backend.state().data().await.requests.last().unwrap(),
        "/users/7/categories/1001/bulk-add-cards"
    );
    let owned = api.collection(SACHA).await.unwrap();
    assert_eq!(owned.last().unwrap().details.name, "Lugia");

    api.remove_card_from_category(SACHA, holos.id, CardId::new(58))
        .await
        .unwrap();
    let view = collection.category_view(SACHA, holos.id, "").await.unwrap();
    assert_eq!(card_names(&view), ["Lugia"]);

    api.delete_category(SACHA, CategoryId::new(BASE_SET_CATEGORY))
        .await
        .unwrap();
    let names: Vec<String> = api
        .categories(SACHA)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Favoris", "Holos"]);
    let links = api.category_links(SACHA).await.unwrap();
    assert!(
        links
            .iter()
            .all(|l| l.category_id != CategoryId::new(BASE_SET_CATEGORY))
    );
    // Deleting a category keeps its cards.
    assert_eq!(api.collection(SACHA).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_transfer_to_marketplace() {
    let (_backend, services) = setup().await;
    let api = services.api();
    let mewtwo = api
        .collection(SACHA)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.details.name == "Mewtwo")
        .unwrap();

    assert!(matches!(
        services
            .collection()
            .transfer_to_marketplace(SACHA, &mewtwo, ListingKind::All, None)
            .await,
        Err(ClientError::Draft(DraftError::NoKind))
    ));

    let outcome = services
        .collection()
        .transfer_to_marketplace(SACHA, &mewtwo, ListingKind::Sale, Some(Price::from_cents(2500)))
        .await
        .unwrap();
    assert_eq!(outcome, Transfer::Moved);

    let listings = api.seller_listings(SACHA).await.unwrap();
    let listed = listings.iter().find(|l| l.card_id == Some(mewtwo.id)).unwrap();
    assert_eq!(listed.price, Some(Price::from_cents(2500)));
    assert_eq!(listed.title(), "Mewtwo (1999)");
    assert!(!api.in_collection(SACHA, mewtwo.id, &mewtwo.details).await.unwrap());
    assert!(
        api.category_links(SACHA)
            .await
            .unwrap()
            .iter()
            .all(|l| l.card_id != mewtwo.id)
    );

    // No longer owned: listed again, but nothing to remove.
    let outcome = services
        .collection()
        .transfer_to_marketplace(SACHA, &mewtwo, ListingKind::Exchange, None)
        .await
        .unwrap();
    assert_eq!(outcome, Transfer::ListedOnly);
}

#[tokio::test]
async fn test_add_to_collection_once() {
    let (backend, services) = setup().await;
    let api = services.api();
    let lugia = api.get_card(CardId::new(249)).await.unwrap();

    assert!(!api.in_collection(SACHA, lugia.id, &lugia.details).await.unwrap());
    api.add_to_collection(SACHA, &lugia, Some(CategoryId::new(FAVOURITES_CATEGORY)))
        .await
        .unwrap();
    assert!(api.in_collection(SACHA, lugia.id, &lugia.details).await.unwrap());

    let err = api.add_to_collection(SACHA, &lugia, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected(reason) if reason == "Carte déjà dans la collection"));

    {
        let data = backend.state().data().await;
        let row = &data.collections[&SACHA_ID][4];
        assert_eq!(row["userId"], 7);
        assert_eq!(row["categoryId"], 2);
    }
    let favourites = services
        .collection()
        .category_view(SACHA, CategoryId::new(FAVOURITES_CATEGORY), "neo")
        .await
        .unwrap();
    assert_eq!(card_names(&favourites), ["Lugia"]);
}

#[tokio::test]
async fn test_saved_cards() {
    let (_backend, services) = setup().await;
    let api = services.api();

    let saved = api.saved_cards(SACHA).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, SavedCardId::new(1));
    assert_eq!(saved[0].card_id, Some(CardId::new(249)));
    assert_eq!(saved[0].details.card_set.as_deref(), Some("Neo Genesis"));

    api.save_card(SACHA, CardId::new(4), &dracaufeu()).await.unwrap();
    api.delete_saved_card(SavedCardId::new(1)).await.unwrap();

    let saved = api.saved_cards(SACHA).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].card_id, Some(CardId::new(4)));
    assert_eq!(saved[0].details.name, "Dracaufeu");
    assert!(api.saved_cards(AccountId::new(42)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_profile_refreshes_cache() {
    let (backend, services) = setup().await;
    let api = services.api();

    let profile = api.get_profile(SACHA).await.unwrap();
    assert_eq!(profile.paypal.as_deref(), Some("sacha@paypal.fr"));
    api.get_profile(SACHA).await.unwrap();

    let update = ProfileUpdate {
        pseudo: "Sacha K".to_string(),
        paypal: String::new(),
        ..ProfileUpdate::from(&profile)
    };
    assert_eq!(update.address, "1 Route 1");
    api.update_profile(SACHA, &update).await.unwrap();

    let profile = api.get_profile(SACHA).await.unwrap();
    assert_eq!(profile.pseudo.as_deref(), Some("Sacha K"));
    assert!(profile.paypal.is_none());
    assert_eq!(profile.delivery.address, "1 Route 1");

    let data = backend.state().data().await;
    let fetched = data.requests.iter().filter(|r| r.as_str() == "/users/id/7").count();
    assert_eq!(fetched, 2);
    assert!(data.requests.iter().any(|r| r == "PUT /users/7"));
}
