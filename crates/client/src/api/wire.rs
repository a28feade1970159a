//! JSON shapes exchanged with the backend.
//!
//! The backend is loose with scalar types (ids and counters arrive as numbers
//! or strings, flags as booleans or 0/1, timestamps as RFC 3339 or SQL
//! datetimes), so most fields go through the lenient helpers at the bottom.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use cardtrade_core::listing::CardDetails;
use cardtrade_core::{AccountId, CardId, CategoryId, ParticipantId, Price};

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pseudo: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub paypal: Option<String>,
}

// =============================================================================
// Conversations
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ConversationRow {
    pub conversation_id: String,
    #[serde(default)]
    pub other_user_id: Option<ParticipantId>,
    #[serde(default)]
    pub other_user_pseudo: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub last_message_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub unread_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    pub sender_id: ParticipantId,
    #[serde(default)]
    pub receiver_id: Option<ParticipantId>,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "created_at", alias = "sent_at", deserialize_with = "lenient_datetime")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "read", deserialize_with = "lenient_bool")]
    pub is_read: bool,
}

/// Answer to a send; the backend may echo the stored message or nothing.
#[derive(Debug, Default, Deserialize)]
pub struct SendAck {
    #[serde(default, alias = "message_id", deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default, alias = "created_at", deserialize_with = "lenient_datetime")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateConversationBody<'a> {
    pub conversation_id: &'a str,
    pub user_ids: [&'a ParticipantId; 2],
}

#[derive(Debug, Serialize)]
pub struct SendMessageBody<'a> {
    pub sender_id: &'a ParticipantId,
    pub receiver_id: &'a ParticipantId,
    pub content: &'a str,
    #[serde(rename = "type")]
    pub kind: cardtrade_core::conversation::MessageKind,
}

#[derive(Debug, Serialize)]
pub struct ResetUnreadBody<'a> {
    pub conversation_id: &'a str,
    pub user_id: &'a ParticipantId,
}

#[derive(Debug, Deserialize)]
pub struct UnreadResponse {
    #[serde(default, rename = "totalUnread", deserialize_with = "lenient_i64")]
    pub total_unread: Option<i64>,
}

// =============================================================================
// Marketplace & catalogue
// =============================================================================

/// Listing row. Older rows and newer rows name some columns differently
/// (`prix`/`price`, `user_id`/`sellerId`/`ownerId`); each spelling has its own
/// field so a row carrying both still parses.
#[derive(Debug, Deserialize)]
pub struct ListingRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub card_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub seller_id: Option<i64>,
    #[serde(default, rename = "sellerId", deserialize_with = "lenient_i64")]
    pub seller_id_camel: Option<i64>,
    #[serde(default, rename = "ownerId", deserialize_with = "lenient_i64")]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year: Option<i64>,
    #[serde(default)]
    pub card_set: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub prix: Option<Price>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ListingRecord {
    /// `prix` wins over `price`.
    #[must_use]
    pub fn asking_price(&self) -> Option<Price> {
        self.prix.or(self.price)
    }

    #[must_use]
    pub fn seller(&self) -> Option<i64> {
        self.user_id
            .or(self.seller_id)
            .or(self.seller_id_camel)
            .or(self.owner_id)
    }

    #[must_use]
    pub fn take_photo(&mut self) -> Option<String> {
        self.photo
            .take()
            .or_else(|| self.image_url.take())
            .or_else(|| self.image.take())
    }
}

#[derive(Debug, Deserialize)]
pub struct CardRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, rename = "objectID", deserialize_with = "lenient_string")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year: Option<i64>,
    #[serde(default)]
    pub card_set: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CardSearchResponse {
    #[serde(default)]
    pub results: Vec<CardRecord>,
    #[serde(default, rename = "nbPages", deserialize_with = "lenient_i64")]
    pub nb_pages: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RandomCardsResponse {
    #[serde(default)]
    pub cards: Option<Vec<CardRecord>>,
    #[serde(default)]
    pub results: Option<Vec<CardRecord>>,
}

/// Acknowledgement of a write; `success: false` comes with a reason.
#[derive(Debug, Default, Deserialize)]
pub struct SuccessResponse {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExistsResponse {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub exists: bool,
    #[serde(default)]
    pub card: Option<IdRecord>,
}

#[derive(Debug, Serialize)]
pub struct CardDetailsBody<'a> {
    pub name: &'a str,
    pub year: Option<i32>,
    pub card_set: Option<&'a str>,
    pub number: Option<&'a str>,
    pub attributes: Option<&'a str>,
}

impl<'a> From<&'a CardDetails> for CardDetailsBody<'a> {
    fn from(details: &'a CardDetails) -> Self {
        Self {
            name: &details.name,
            year: details.year,
            card_set: details.card_set.as_deref(),
            number: details.number.as_deref(),
            attributes: details.attributes.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewCardBody<'a> {
    #[serde(flatten)]
    pub details: CardDetailsBody<'a>,
    #[serde(rename = "firebase_ID")]
    pub owner: AccountId,
    pub photo: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct NewListingBody<'a> {
    pub user_id: AccountId,
    pub cards_id: CardId,
    #[serde(flatten)]
    pub details: CardDetailsBody<'a>,
    pub photo: Option<&'a str>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub prix: Option<Price>,
}

// =============================================================================
// Collections & saved cards
// =============================================================================

/// Collection row. `id` names the card; some rows only carry `cards_id`.
#[derive(Debug, Deserialize)]
pub struct CollectionCardRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub cards_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year: Option<i64>,
    #[serde(default)]
    pub card_set: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionResponse {
    #[serde(default)]
    pub collection: Vec<CollectionCardRecord>,
}

#[derive(Debug, Serialize)]
pub struct CollectionEntryBody<'a> {
    #[serde(rename = "userId")]
    pub user_id: AccountId,
    pub cards_id: CardId,
    #[serde(flatten)]
    pub details: CardDetailsBody<'a>,
    pub photo: Option<&'a str>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Serialize)]
pub struct CollectionCheckBody<'a> {
    #[serde(rename = "userId")]
    pub user_id: AccountId,
    pub cards_id: CardId,
    #[serde(flatten)]
    pub details: CardDetailsBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct CollectionRemoveBody {
    #[serde(rename = "userId")]
    pub user_id: AccountId,
    pub cards_id: CardId,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "cardCount", deserialize_with = "lenient_i64")]
    pub card_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryLinkRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub category_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub card_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CategoryBody<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BulkAddBody<'a> {
    #[serde(rename = "cardIdentifiers")]
    pub card_identifiers: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
pub struct CountResponse {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SavedCardRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub card_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year: Option<i64>,
    #[serde(default)]
    pub card_set: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

/// Saved cards come wrapped in `savedCards` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SavedCardsResponse {
    Wrapped {
        #[serde(rename = "savedCards")]
        saved_cards: Vec<SavedCardRecord>,
    },
    Bare(Vec<SavedCardRecord>),
}

impl SavedCardsResponse {
    #[must_use]
    pub fn into_records(self) -> Vec<SavedCardRecord> {
        match self {
            Self::Wrapped { saved_cards } | Self::Bare(saved_cards) => saved_cards,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaveCardBody<'a> {
    #[serde(rename = "userId")]
    pub user_id: AccountId,
    #[serde(rename = "cardId")]
    pub card_id: CardId,
    #[serde(flatten)]
    pub details: CardDetailsBody<'a>,
}

// =============================================================================
// Shipping & orders
// =============================================================================

/// Method tag the backend uses for relay deliveries.
pub const RELAY_METHOD: &str = "point_relais";

#[derive(Debug, Deserialize)]
pub struct ShippingOptionRecord {
    #[serde(deserialize_with = "required_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Price,
    #[serde(rename = "type")]
    pub method: String,
    #[serde(default, rename = "isSpecificPoint", deserialize_with = "lenient_bool")]
    pub is_specific_point: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutResponse {
    #[serde(default, rename = "redirectUrl", alias = "redirect_url", alias = "approvalUrl")]
    pub redirect_url: Option<String>,
    #[serde(default, alias = "orderId", deserialize_with = "lenient_i64")]
    pub order_id: Option<i64>,
}

// =============================================================================
// Lenient scalars
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Scalar>::deserialize(d)? {
        Some(Scalar::Int(n)) => Some(n),
        Some(Scalar::Text(s)) => s.trim().parse().ok(),
        #[allow(clippy::cast_possible_truncation)] // whole-number floats only
        Some(Scalar::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Scalar>::deserialize(d)? {
        Some(Scalar::Text(s)) => Some(s),
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Bool(_)) | None => None,
    })
}

fn required_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_string(d)?.ok_or_else(|| serde::de::Error::custom("expected a string or number"))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Scalar>::deserialize(d)? {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Int(n)) => n != 0,
        Some(Scalar::Text(s)) => matches!(s.trim(), "1" | "true"),
        Some(Scalar::Float(_)) | None => false,
    })
}

fn lenient_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(d)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_lenient_id() {
        let record: UserRecord = serde_json::from_str(r#"{"id": "17", "pseudo": "Sacha"}"#).unwrap();
        assert_eq!(record.id, Some(17));
        let record: UserRecord = serde_json::from_str(r#"{"id": 18, "postal_code": 75001}"#).unwrap();
        assert_eq!(record.id, Some(18));
        assert_eq!(record.postal_code.as_deref(), Some("75001"));
    }

    #[test]
    fn test_message_record_sql_datetime_and_flag() {
        let record: MessageRecord = serde_json::from_str(
            r#"{"id": 3, "sender_id": 9, "content": "yo", "created_at": "2024-05-01 10:00:00", "is_read": 1}"#,
        )
        .unwrap();
        assert_eq!(record.timestamp.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(record.is_read);
        assert!(record.receiver_id.is_none());
    }

    #[test]
    fn test_listing_record_price_as_string() {
        let record: ListingRecord = serde_json::from_str(
            r#"{"id": 1, "name": "Dracaufeu", "prix": "12.50", "type": "Vente", "user_id": "4"}"#,
        )
        .unwrap();
        assert_eq!(record.asking_price(), Some(Price::from_cents(1250)));
        assert_eq!(record.seller(), Some(4));
    }

    #[test]
    fn test_listing_record_with_both_price_spellings() {
        let records: Vec<ListingRecord> = serde_json::from_str(
            r#"[{"id": 1, "prix": "12.50", "price": 13, "user_id": 4, "sellerId": 5},
                {"id": 2, "price": 3.49, "ownerId": "6", "image": "a.jpg"}]"#,
        )
        .unwrap();
        assert_eq!(records[0].asking_price(), Some(Price::from_cents(1250)));
        assert_eq!(records[0].seller(), Some(4));
        assert_eq!(records[1].asking_price(), Some(Price::from_cents(349)));
        assert_eq!(records[1].seller(), Some(6));
    }

    #[test]
    fn test_shipping_option_record() {
        let record: ShippingOptionRecord = serde_json::from_str(
            r#"{"id": 2, "name": "Colissimo", "price": 5.9, "type": "colissimo"}"#,
        )
        .unwrap();
        assert_eq!(record.id, "2");
        assert_eq!(record.price, Price::from_cents(590));
        assert!(!record.is_specific_point);
    }

    #[test]
    fn test_saved_cards_wrapped_or_bare() {
        let wrapped: SavedCardsResponse =
            serde_json::from_str(r#"{"savedCards": [{"id": "3", "card_id": 8, "name": "Mew"}]}"#)
                .unwrap();
        let bare: SavedCardsResponse =
            serde_json::from_str(r#"[{"id": 3, "card_id": "8", "name": "Mew"}]"#).unwrap();
        for response in [wrapped, bare] {
            let records = response.into_records();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].id, Some(3));
            assert_eq!(records[0].card_id, Some(8));
        }
    }

    #[test]
    fn test_listing_body_flattens_details() {
        let details = CardDetails {
            name: "Mew".to_owned(),
            year: Some(2001),
            ..CardDetails::default()
        };
        let body = NewListingBody {
            user_id: AccountId::new(7),
            cards_id: CardId::new(151),
            details: (&details).into(),
            photo: None,
            kind: "Échange",
            prix: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["name"], "Mew");
        assert_eq!(json["year"], 2001);
        assert_eq!(json["type"], "Échange");
        assert!(json["prix"].is_null());
        assert!(json.get("details").is_none());
    }
}
