//! Integration test support for Cardtrade.
//!
//! Tests drive the real `cardtrade-client` services (real `reqwest` client,
//! real JSON) against [`StubBackend`], an in-process `axum` server that
//! speaks the marketplace REST API from in-memory data.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cardtrade-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `accounts` - Account id resolution with retry
//! - `messaging` - Conversations and unread counters over REST
//! - `marketplace` - Listing search, feed polling, card catalogue, publishing,
//!   collections, categories, saved cards and profile edits
//! - `checkout` - Shipping options, relay points and order placement

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use cardtrade_client::auth::RetryPolicy;
use cardtrade_client::{ClientConfig, ConfigError};

/// A registered account.
#[derive(Debug, Clone, Default)]
pub struct StubUser {
    pub id: i64,
    pub email: String,
    pub pseudo: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub paypal: Option<String>,
}

impl StubUser {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "pseudo": self.pseudo,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "address": self.address,
            "postal_code": self.postal_code,
            "city": self.city,
            "country": self.country,
            "paypal": self.paypal,
        })
    }
}

/// A stored conversation, keyed by its id in [`StubData::conversations`].
#[derive(Debug, Clone)]
pub struct StubConversation {
    pub user_ids: [Value; 2],
    pub messages: Vec<Value>,
    pub last_message: String,
    pub last_message_timestamp: String,
    /// Participant key (see [`participant_key`]) to unread count.
    pub unread: HashMap<String, i64>,
}

/// Everything the stub backend knows.
#[derive(Debug, Default)]
pub struct StubData {
    pub users: Vec<StubUser>,
    /// Email to number of lookups answered 404 before the user is visible.
    pub lookup_failures: HashMap<String, u32>,
    /// Email to number of lookups received.
    pub lookups: HashMap<String, u32>,
    pub conversations: HashMap<String, StubConversation>,
    pub listings: Vec<Value>,
    /// Card search index (string object ids).
    pub cards: Vec<Value>,
    /// Stored cards (numeric ids), by `cards/exists`, `cards/add` and `cards/{id}`.
    pub stored_cards: Vec<Value>,
    /// Account id to collection rows.
    pub collections: HashMap<i64, Vec<Value>>,
    /// Account id to `(category id, name)`.
    pub categories: HashMap<i64, Vec<(i64, String)>>,
    /// Account id to `(category id, card id)` links.
    pub category_links: HashMap<i64, Vec<(i64, i64)>>,
    /// Saved-card rows, each with its owner in `userId`.
    pub saved_cards: Vec<Value>,
    pub shipping_options: Vec<Value>,
    /// Postal code to located relay points.
    pub relay_points: HashMap<String, Vec<Value>>,
    /// Bodies received on `POST /orders/checkout`.
    pub orders: Vec<Value>,
    /// Path and query of every request, in order.
    pub requests: Vec<String>,
    /// Answer marketplace requests with 500.
    pub fail_marketplace: bool,
    next_message_id: i64,
    next_id: i64,
}

impl StubData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

/// Shared handle to the stub's data.
#[derive(Debug, Clone, Default)]
pub struct StubState {
    inner: Arc<Mutex<StubData>>,
}

impl StubState {
    /// Lock the data for inspection or seeding.
    pub async fn data(&self) -> MutexGuard<'_, StubData> {
        self.inner.lock().await
    }

    /// A backend with a few users, listings, cards and shipping options.
    #[must_use]
    pub fn seeded() -> Self {
        Self {
            inner: Arc::new(Mutex::new(fixtures::data())),
        }
    }

    async fn record(&self, request: String) -> MutexGuard<'_, StubData> {
        let mut data = self.inner.lock().await;
        data.requests.push(request);
        data
    }
}

/// In-process REST backend bound to `127.0.0.1` on a random port.
#[derive(Debug)]
pub struct StubBackend {
    addr: SocketAddr,
    state: StubState,
    task: JoinHandle<()>,
}

impl StubBackend {
    /// Start serving `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(state: StubState) -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(state.clone());

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Stub backend stopped");
            }
        });

        Ok(Self { addr, state, task })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    #[must_use]
    pub const fn state(&self) -> &StubState {
        &self.state
    }

    /// Client configuration pointing at this backend, with short lookup
    /// delays (10, 20, 40, 80 ms) so retry tests stay fast.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is rejected.
    pub fn config(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = ClientConfig::new(&self.base_url())?;
        config.lookup_retry = RetryPolicy {
            initial_delay: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        config.http_timeout = Duration::from_secs(5);
        Ok(config)
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Key under which a participant's unread count is stored.
#[must_use]
pub fn participant_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn router(state: StubState) -> Router {
    Router::new()
        .route("/users/email/{email}", get(find_user))
        .route("/users/id/{id}", get(get_user))
        .route("/conversations/user/{id}", get(list_conversations))
        .route("/conversations/create", post(create_conversation))
        .route(
            "/conversations/messages/{conversation_id}",
            get(get_messages).post(send_message),
        )
        .route("/conversations/reset-unread", post(reset_unread))
        .route("/conversations/unread/{id}", get(total_unread))
        .route("/marketplace/all", get(all_listings))
        .route("/marketplace/search", get(search_listings))
        .route("/marketplace/add", post(add_listing))
        .route("/marketplace/user/{id}", get(seller_listings))
        .route("/marketplace/{id}", delete(delete_listing))
        .route("/cards/search", get(search_cards))
        .route("/cards/random", get(random_cards))
        .route("/cards/exists", post(card_exists))
        .route("/cards/add", post(add_card))
        .route("/cards/{id}", get(get_card))
        .route("/cards/add-to-collection", post(add_to_collection))
        .route("/cards/check-in-collection", post(check_in_collection))
        .route("/cards/delete", post(remove_from_collection))
        .route("/cards/saved-cards", post(save_card))
        .route("/cards/saved-cards/{id}", get(saved_cards).delete(delete_saved_card))
        .route("/users/{id}", put(update_user))
        .route("/users/{id}/collection", get(collection))
        .route("/users/{id}/categories", get(categories).post(create_category))
        .route("/users/{id}/categories/{category}", delete(delete_category))
        .route("/users/{id}/card-categories", get(card_categories))
        .route(
            "/users/{id}/categories/{category}/remove-card/{card}",
            delete(remove_card_from_category),
        )
        .route(
            "/users/{id}/categories/{category}/bulk-add-cards",
            post(bulk_add_cards),
        )
        .route("/shipping-options", get(shipping_options))
        .route("/shipping-options/relay-points", get(relay_points))
        .route("/orders/checkout", post(checkout))
        .with_state(state)
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("{what} not found") }))).into_response()
}

// =============================================================================
// Users
// =============================================================================

async fn find_user(State(state): State<StubState>, Path(email): Path<String>) -> Response {
    let mut data = state.record(format!("/users/email/{email}")).await;
    let seen = {
        let count = data.lookups.entry(email.clone()).or_insert(0);
        *count += 1;
        *count
    };
    if seen <= data.lookup_failures.get(&email).copied().unwrap_or(0) {
        return not_found("user");
    }
    match data.users.iter().find(|u| u.email == email) {
        Some(user) => Json(json!({ "id": user.id, "email": user.email })).into_response(),
        None => not_found("user"),
    }
}

async fn get_user(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/users/id/{id}")).await;
    match data.users.iter().find(|u| u.id == id) {
        Some(user) => Json(user.to_json()).into_response(),
        None => not_found("user"),
    }
}

#[derive(Deserialize)]
struct UserUpdate {
    pseudo: String,
    address: String,
    paypal: String,
}

async fn update_user(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    Json(body): Json<UserUpdate>,
) -> Response {
    let mut data = state.record(format!("PUT /users/{id}")).await;
    let Some(user) = data.users.iter_mut().find(|u| u.id == id) else {
        return not_found("user");
    };
    user.pseudo = Some(body.pseudo).filter(|p| !p.is_empty());
    user.address = body.address;
    user.paypal = Some(body.paypal).filter(|p| !p.is_empty());
    Json(json!({ "success": true })).into_response()
}

// =============================================================================
// Conversations
// =============================================================================

async fn list_conversations(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    let data = state.record(format!("/conversations/user/{id}")).await;
    let rows: Vec<Value> = data
        .conversations
        .iter()
        .filter_map(|(conversation_id, c)| {
            let other = c
                .user_ids
                .iter()
                .find(|u| participant_key(u) != id)?
                .clone();
            if !c.user_ids.iter().any(|u| participant_key(u) == id) {
                return None;
            }
            let pseudo = other
                .as_i64()
                .and_then(|other_id| data.users.iter().find(|u| u.id == other_id))
                .and_then(|u| u.pseudo.clone());
            Some(json!({
                "conversation_id": conversation_id,
                "other_user_id": other,
                "other_user_pseudo": pseudo,
                "last_message": c.last_message,
                "last_message_timestamp": c.last_message_timestamp,
                "unread_count": c.unread.get(&id).copied().unwrap_or(0).to_string(),
            }))
        })
        .collect();
    Json(rows).into_response()
}

#[derive(Deserialize)]
struct CreateConversation {
    conversation_id: String,
    user_ids: [Value; 2],
}

async fn create_conversation(
    State(state): State<StubState>,
    Json(body): Json<CreateConversation>,
) -> Response {
    let mut data = state.record("/conversations/create".to_string()).await;
    data.conversations
        .entry(body.conversation_id)
        .or_insert_with(|| StubConversation {
            unread: body
                .user_ids
                .iter()
                .map(|u| (participant_key(u), 0))
                .collect(),
            user_ids: body.user_ids,
            messages: Vec::new(),
            last_message: String::new(),
            last_message_timestamp: Utc::now().to_rfc3339(),
        });
    StatusCode::NO_CONTENT.into_response()
}

async fn get_messages(
    State(state): State<StubState>,
    Path(conversation_id): Path<String>,
) -> Response {
    let data = state
        .record(format!("/conversations/messages/{conversation_id}"))
        .await;
    match data.conversations.get(&conversation_id) {
        Some(c) => Json(c.messages.clone()).into_response(),
        None => not_found("conversation"),
    }
}

#[derive(Deserialize)]
struct SendMessage {
    sender_id: Value,
    receiver_id: Value,
    content: String,
    #[serde(rename = "type")]
    kind: String,
}

async fn send_message(
    State(state): State<StubState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Response {
    let mut data = state
        .record(format!("POST /conversations/messages/{conversation_id}"))
        .await;
    data.next_message_id += 1;
    let id = data.next_message_id;
    let Some(conversation) = data.conversations.get_mut(&conversation_id) else {
        return not_found("conversation");
    };

    // Older rows were stored in SQL datetime format.
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    conversation.messages.push(json!({
        "id": id,
        "sender_id": body.sender_id,
        "receiver_id": body.receiver_id,
        "content": body.content,
        "type": body.kind,
        "created_at": timestamp,
        "is_read": 0,
    }));
    conversation.last_message = body.content;
    conversation.last_message_timestamp.clone_from(&timestamp);
    *conversation
        .unread
        .entry(participant_key(&body.receiver_id))
        .or_insert(0) += 1;

    Json(json!({ "message_id": id, "created_at": timestamp })).into_response()
}

#[derive(Deserialize)]
struct ResetUnread {
    conversation_id: String,
    user_id: Value,
}

async fn reset_unread(State(state): State<StubState>, Json(body): Json<ResetUnread>) -> Response {
    let mut data = state.record("/conversations/reset-unread".to_string()).await;
    let Some(conversation) = data.conversations.get_mut(&body.conversation_id) else {
        return not_found("conversation");
    };
    let reader = participant_key(&body.user_id);
    conversation.unread.insert(reader.clone(), 0);
    for message in &mut conversation.messages {
        if message.get("receiver_id").map(participant_key).as_deref() == Some(reader.as_str()) {
            message["is_read"] = json!(1);
        }
    }
    Json(json!({ "success": true })).into_response()
}

async fn total_unread(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    let data = state.record(format!("/conversations/unread/{id}")).await;
    let total: i64 = data
        .conversations
        .values()
        .filter_map(|c| c.unread.get(&id))
        .sum();
    Json(json!({ "totalUnread": total })).into_response()
}

// =============================================================================
// Marketplace & catalogue
// =============================================================================

async fn all_listings(State(state): State<StubState>) -> Response {
    let data = state.record("/marketplace/all".to_string()).await;
    if data.fail_marketplace {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(data.listings.clone()).into_response()
}

#[derive(Deserialize)]
struct ListingSearch {
    #[serde(rename = "priceMin")]
    price_min: Option<f64>,
    #[serde(rename = "priceMax")]
    price_max: Option<f64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn listing_price(listing: &Value) -> Option<f64> {
    match listing.get("prix")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Filters on type and price only; the text is ignored like the legacy
/// search endpoint does.
async fn search_listings(
    State(state): State<StubState>,
    RawQuery(raw): RawQuery,
    Query(search): Query<ListingSearch>,
) -> Response {
    let data = state
        .record(format!("/marketplace/search?{}", raw.unwrap_or_default()))
        .await;
    if data.fail_marketplace {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let listings: Vec<Value> = data
        .listings
        .iter()
        .filter(|l| {
            search
                .kind
                .as_deref()
                .is_none_or(|kind| l.get("type").and_then(Value::as_str) == Some(kind))
        })
        .filter(|l| match (search.price_min, search.price_max) {
            (None, None) => true,
            (min, max) => listing_price(l).is_some_and(|p| {
                min.is_none_or(|min| p >= min) && max.is_none_or(|max| p <= max)
            }),
        })
        .cloned()
        .collect();
    Json(listings).into_response()
}

/// Numeric id under `key`, whether sent as a number or a string.
fn id_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

async fn add_listing(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut data = state.record("/marketplace/add".to_string()).await;
    let id = data.next_id();
    let mut listing = body;
    listing["id"] = json!(id);
    listing["card_id"] = listing["cards_id"].clone();
    listing["status"] = json!("available");
    data.listings.push(listing);
    Json(json!({ "success": true, "id": id })).into_response()
}

async fn seller_listings(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/marketplace/user/{id}")).await;
    let listings: Vec<Value> = data
        .listings
        .iter()
        .filter(|l| id_field(l, "user_id") == Some(id))
        .cloned()
        .collect();
    Json(listings).into_response()
}

async fn delete_listing(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let mut data = state.record(format!("DELETE /marketplace/{id}")).await;
    let before = data.listings.len();
    data.listings.retain(|l| id_field(l, "id") != Some(id));
    if data.listings.len() == before {
        return not_found("listing");
    }
    Json(json!({ "success": true })).into_response()
}

#[derive(Deserialize)]
struct CardSearch {
    q: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

async fn search_cards(
    State(state): State<StubState>,
    RawQuery(raw): RawQuery,
    Query(search): Query<CardSearch>,
) -> Response {
    let data = state
        .record(format!("/cards/search?{}", raw.unwrap_or_default()))
        .await;
    let needle = search.q.unwrap_or_default().to_lowercase();
    let matching: Vec<&Value> = data
        .cards
        .iter()
        .filter(|c| {
            c.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect();
    let limit = search.limit.unwrap_or(20).max(1);
    let nb_pages = matching.len().div_ceil(limit).max(1);
    let results: Vec<Value> = matching
        .into_iter()
        .skip(search.page.unwrap_or(0) * limit)
        .take(limit)
        .cloned()
        .collect();
    Json(json!({ "results": results, "nbPages": nb_pages })).into_response()
}

#[derive(Deserialize)]
struct Limit {
    limit: Option<usize>,
}

async fn random_cards(State(state): State<StubState>, Query(limit): Query<Limit>) -> Response {
    let data = state.record("/cards/random".to_string()).await;
    let cards: Vec<Value> = data
        .cards
        .iter()
        .rev()
        .take(limit.limit.unwrap_or(10))
        .cloned()
        .collect();
    Json(json!({ "cards": cards })).into_response()
}

/// Same name, year, set and number.
fn same_card(stored: &Value, details: &Value) -> bool {
    let text = |v: &Value, key: &str| match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    ["name", "year", "card_set", "number"]
        .iter()
        .all(|key| text(stored, key) == text(details, key))
}

async fn card_exists(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let data = state.record("/cards/exists".to_string()).await;
    match data.stored_cards.iter().find(|c| same_card(c, &body)) {
        Some(card) => Json(json!({ "exists": true, "card": { "id": card["id"] } })).into_response(),
        None => Json(json!({ "exists": false })).into_response(),
    }
}

async fn add_card(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut data = state.record("/cards/add".to_string()).await;
    let id = data.next_id();
    let mut card = body;
    card["id"] = json!(id);
    data.stored_cards.push(card);
    Json(json!({ "id": id })).into_response()
}

async fn get_card(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/cards/{id}")).await;
    match data.stored_cards.iter().find(|c| id_field(c, "id") == Some(id)) {
        Some(card) => Json(card.clone()).into_response(),
        None => not_found("card"),
    }
}

/// Card id of a collection row; older rows only carry `cards_id`.
fn row_card_id(row: &Value) -> Option<i64> {
    id_field(row, "id").or_else(|| id_field(row, "cards_id"))
}

fn owns(data: &StubData, user: i64, card: i64) -> bool {
    data.collections
        .get(&user)
        .is_some_and(|rows| rows.iter().any(|r| row_card_id(r) == Some(card)))
}

async fn add_to_collection(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut data = state.record("/cards/add-to-collection".to_string()).await;
    let (Some(user), Some(card)) = (id_field(&body, "userId"), id_field(&body, "cards_id")) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if owns(&data, user, card) {
        return Json(json!({ "success": false, "message": "Carte déjà dans la collection" }))
            .into_response();
    }
    let mut row = body.clone();
    row["id"] = json!(card);
    data.collections.entry(user).or_default().push(row);
    if let Some(category) = id_field(&body, "categoryId") {
        data.category_links
            .entry(user)
            .or_default()
            .push((category, card));
    }
    Json(json!({ "success": true, "message": "Carte ajoutée" })).into_response()
}

async fn check_in_collection(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let data = state.record("/cards/check-in-collection".to_string()).await;
    let exists = match (id_field(&body, "userId"), id_field(&body, "cards_id")) {
        (Some(user), Some(card)) => owns(&data, user, card),
        _ => false,
    };
    Json(json!({ "exists": exists })).into_response()
}

async fn remove_from_collection(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> Response {
    let mut data = state.record("/cards/delete".to_string()).await;
    let (Some(user), Some(card)) = (id_field(&body, "userId"), id_field(&body, "cards_id")) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !owns(&data, user, card) {
        return Json(json!({ "success": false })).into_response();
    }
    if let Some(rows) = data.collections.get_mut(&user) {
        rows.retain(|r| row_card_id(r) != Some(card));
    }
    if let Some(links) = data.category_links.get_mut(&user) {
        links.retain(|(_, c)| *c != card);
    }
    Json(json!({ "success": true })).into_response()
}

async fn collection(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/users/{id}/collection")).await;
    let rows = data.collections.get(&id).cloned().unwrap_or_default();
    Json(json!({ "collection": rows })).into_response()
}

async fn categories(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/users/{id}/categories")).await;
    let links = data.category_links.get(&id);
    let rows: Vec<Value> = data
        .categories
        .get(&id)
        .into_iter()
        .flatten()
        .map(|(category, name)| {
            let count = links
                .into_iter()
                .flatten()
                .filter(|(c, _)| c == category)
                .count();
            json!({ "id": category, "name": name, "cardCount": count.to_string() })
        })
        .collect();
    Json(rows).into_response()
}

#[derive(Deserialize)]
struct NewCategory {
    name: String,
}

async fn create_category(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    Json(body): Json<NewCategory>,
) -> Response {
    let mut data = state.record(format!("POST /users/{id}/categories")).await;
    let category = data.next_id();
    data.categories
        .entry(id)
        .or_default()
        .push((category, body.name.clone()));
    (StatusCode::CREATED, Json(json!({ "id": category, "name": body.name }))).into_response()
}

async fn delete_category(
    State(state): State<StubState>,
    Path((id, category)): Path<(i64, i64)>,
) -> Response {
    let mut data = state
        .record(format!("DELETE /users/{id}/categories/{category}"))
        .await;
    if let Some(categories) = data.categories.get_mut(&id) {
        categories.retain(|(c, _)| *c != category);
    }
    if let Some(links) = data.category_links.get_mut(&id) {
        links.retain(|(c, _)| *c != category);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn card_categories(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/users/{id}/card-categories")).await;
    let rows: Vec<Value> = data
        .category_links
        .get(&id)
        .into_iter()
        .flatten()
        .map(|(category, card)| json!({ "category_id": category, "card_id": card }))
        .collect();
    Json(rows).into_response()
}

async fn remove_card_from_category(
    State(state): State<StubState>,
    Path((id, category, card)): Path<(i64, i64, i64)>,
) -> Response {
    let mut data = state
        .record(format!(
            "DELETE /users/{id}/categories/{category}/remove-card/{card}"
        ))
        .await;
    if let Some(links) = data.category_links.get_mut(&id) {
        links.retain(|link| *link != (category, card));
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct BulkAdd {
    #[serde(rename = "cardIdentifiers")]
    card_identifiers: Vec<String>,
}

/// Identifiers are stored card ids; unknown ones are skipped. Cards join the
/// collection when not owned yet.
async fn bulk_add_cards(
    State(state): State<StubState>,
    Path((id, category)): Path<(i64, i64)>,
    Json(body): Json<BulkAdd>,
) -> Response {
    let mut data = state
        .record(format!("/users/{id}/categories/{category}/bulk-add-cards"))
        .await;
    let mut count = 0;
    for identifier in &body.card_identifiers {
        let Some(card) = data
            .stored_cards
            .iter()
            .find(|c| id_field(c, "id").is_some_and(|n| n.to_string() == *identifier))
            .cloned()
        else {
            continue;
        };
        let Some(card_id) = id_field(&card, "id") else {
            continue;
        };
        if !owns(&data, id, card_id) {
            data.collections.entry(id).or_default().push(card);
        }
        let links = data.category_links.entry(id).or_default();
        if !links.contains(&(category, card_id)) {
            links.push((category, card_id));
            count += 1;
        }
    }
    Json(json!({ "count": count })).into_response()
}

async fn saved_cards(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let data = state.record(format!("/cards/saved-cards/{id}")).await;
    let rows: Vec<Value> = data
        .saved_cards
        .iter()
        .filter(|c| id_field(c, "userId") == Some(id))
        .cloned()
        .collect();
    Json(json!({ "savedCards": rows })).into_response()
}

async fn save_card(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut data = state.record("/cards/saved-cards".to_string()).await;
    let id = data.next_id();
    let mut row = body;
    row["id"] = json!(id);
    row["card_id"] = row["cardId"].clone();
    data.saved_cards.push(row);
    Json(json!({ "success": true })).into_response()
}

async fn delete_saved_card(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    let mut data = state.record(format!("DELETE /cards/saved-cards/{id}")).await;
    data.saved_cards.retain(|c| id_field(c, "id") != Some(id));
    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Shipping & orders
// =============================================================================

async fn shipping_options(State(state): State<StubState>) -> Response {
    let data = state.record("/shipping-options".to_string()).await;
    Json(data.shipping_options.clone()).into_response()
}

#[derive(Deserialize)]
struct RelaySearch {
    #[serde(rename = "postalCode")]
    postal_code: String,
}

async fn relay_points(State(state): State<StubState>, Query(search): Query<RelaySearch>) -> Response {
    let data = state
        .record(format!(
            "/shipping-options/relay-points?postalCode={}",
            search.postal_code
        ))
        .await;
    let points = data
        .relay_points
        .get(&search.postal_code)
        .cloned()
        .unwrap_or_default();
    Json(points).into_response()
}

async fn checkout(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut data = state.record("/orders/checkout".to_string()).await;
    data.orders.push(body);
    let order_id = data.orders.len();
    Json(json!({
        "redirectUrl": format!("https://pay.example.com/checkout/{order_id}"),
        "orderId": order_id,
    }))
    .into_response()
}

/// Seed data shared by the tests.
pub mod fixtures {
    use super::{StubData, StubUser, Value, json};

    pub const ADMIN_ID: i64 = 1;
    pub const SACHA_ID: i64 = 7;
    pub const SACHA_EMAIL: &str = "sacha@bourg-palette.fr";
    pub const ONDINE_ID: i64 = 42;
    pub const ONDINE_EMAIL: &str = "ondine@azuria.fr";
    pub const BASE_SET_CATEGORY: i64 = 1;
    pub const FAVOURITES_CATEGORY: i64 = 2;

    pub(super) fn data() -> StubData {
        StubData {
            users: users(),
            listings: listings(),
            cards: cards(),
            stored_cards: stored_cards(),
            collections: [(SACHA_ID, sacha_collection())].into(),
            categories: [(
                SACHA_ID,
                vec![
                    (BASE_SET_CATEGORY, "Set de base".to_string()),
                    (FAVOURITES_CATEGORY, "Favoris".to_string()),
                ],
            )]
            .into(),
            category_links: [(
                SACHA_ID,
                vec![
                    (BASE_SET_CATEGORY, 4),
                    (BASE_SET_CATEGORY, 58),
                    (BASE_SET_CATEGORY, 150),
                    (FAVOURITES_CATEGORY, 58),
                    (FAVOURITES_CATEGORY, 151),
                ],
            )]
            .into(),
            saved_cards: vec![json!({"id": 1, "userId": SACHA_ID, "card_id": 249, "name": "Lugia",
                                     "year": 2000, "card_set": "Neo Genesis", "number": "9"})],
            shipping_options: shipping_options(),
            relay_points: [("69002".to_string(), relay_points_69002())].into(),
            ..StubData::default()
        }
    }

    fn users() -> Vec<StubUser> {
        vec![
            StubUser {
                id: ADMIN_ID,
                email: "support@cardtrade.fr".to_string(),
                pseudo: Some("Support".to_string()),
                ..StubUser::default()
            },
            StubUser {
                id: SACHA_ID,
                email: SACHA_EMAIL.to_string(),
                pseudo: Some("Sacha".to_string()),
                first_name: "Sacha".to_string(),
                last_name: "Ketchum".to_string(),
                address: "1 Route 1".to_string(),
                postal_code: "13001".to_string(),
                city: "Marseille".to_string(),
                country: "FRANCE".to_string(),
                paypal: Some("sacha@paypal.fr".to_string()),
            },
            // Seller without a delivery address.
            StubUser {
                id: ONDINE_ID,
                email: ONDINE_EMAIL.to_string(),
                pseudo: Some("Ondine".to_string()),
                first_name: "Ondine".to_string(),
                ..StubUser::default()
            },
        ]
    }

    fn listings() -> Vec<Value> {
        vec![
            json!({"id": 12, "card_id": 4, "user_id": ONDINE_ID, "name": "Dracaufeu", "year": 1999,
                   "card_set": "Set de base", "number": "4", "type": "Vente", "prix": 12.5,
                   "attributes": {"Etat": "Excellent"}, "status": "available"}),
            json!({"id": 13, "card_id": 58, "user_id": ONDINE_ID, "name": "Pikachu", "year": 1999,
                   "card_set": "Set de base", "number": "58", "type": "Vente", "prix": "4.00"}),
            json!({"id": 14, "card_id": 150, "user_id": "42", "name": "Mewtwo holo", "year": 2000,
                   "type": "Vente", "prix": 80}),
            json!({"id": 15, "card_id": 151, "user_id": SACHA_ID, "name": "Mew", "year": 2001,
                   "type": "Échange"}),
            json!({"id": 16, "user_id": ONDINE_ID, "name": "Pikachu Illustrator", "type": "Vente",
                   "prix": 30, "status": "sold"}),
        ]
    }

    fn cards() -> Vec<Value> {
        (1..=25)
            .map(|n| json!({"objectID": format!("base1-{n}"), "name": format!("Pikachu {n}"),
                            "year": 1999, "set": "Set de base", "number": n}))
            .chain(std::iter::once(
                json!({"objectID": "neo-9", "name": "Lugia", "year": 2000, "number": "9"}),
            ))
            .collect()
    }

    fn stored_cards() -> Vec<Value> {
        vec![
            json!({"id": 4, "name": "Dracaufeu", "year": 1999, "card_set": "Set de base", "number": "4"}),
            json!({"id": 58, "name": "Pikachu", "year": 1999, "card_set": "Set de base", "number": "58"}),
            json!({"id": 150, "name": "Mewtwo", "year": 1999, "card_set": "Set de base", "number": "10"}),
            json!({"id": 151, "name": "Mew", "year": 2001, "card_set": "Promo", "number": "8"}),
            json!({"id": 249, "name": "Lugia", "year": 2000, "card_set": "Neo Genesis", "number": "9"}),
        ]
    }

    fn sacha_collection() -> Vec<Value> {
        vec![
            json!({"id": 4, "name": "Dracaufeu", "year": 1999, "card_set": "Set de base",
                   "number": "4", "attributes": {"Etat": "Excellent"}}),
            json!({"id": "58", "name": "Pikachu", "year": "1999", "set": "Set de base",
                   "number": 58, "attributes": "Edition 1"}),
            json!({"id": 150, "name": "Mewtwo", "year": 1999, "card_set": "Set de base",
                   "number": "10", "photo": "https://img.example.com/mewtwo.jpg"}),
            json!({"cards_id": 151, "name": "Mew", "year": 2001, "card_set": "Promo", "number": "8"}),
        ]
    }

    fn shipping_options() -> Vec<Value> {
        vec![
            json!({"id": "colissimo", "name": "Colissimo", "price": 5.9, "type": "colissimo"}),
            json!({"id": "relay", "name": "Point Relais", "description": "Retrait en point relais",
                   "price": "3.49", "type": "point_relais"}),
            json!({"id": 3, "name": "Lettre suivie", "price": 2, "type": "lettre_suivie"}),
        ]
    }

    fn relay_points_69002() -> Vec<Value> {
        vec![
            json!({"id": "PR-1", "name": "Tabac du Centre (Lyon)",
                   "description": "12 Rue Mercière, 69002 Lyon", "price": 3.49,
                   "type": "point_relais", "isSpecificPoint": true}),
            json!({"id": "PR-2", "name": "Librairie Bellecour (Lyon)",
                   "description": "3 Place Bellecour", "price": 3.49,
                   "type": "point_relais", "isSpecificPoint": 1}),
        ]
    }
}
