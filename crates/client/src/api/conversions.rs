//! Conversions from wire records to domain types.

use chrono::{DateTime, Utc};

use cardtrade_core::checkout::DeliveryProfile;
use cardtrade_core::conversation::{
    ConversationId, ConversationSummary, DEFAULT_PSEUDONYM, Message, MessageKind,
};
use cardtrade_core::collection::{Category, CategoryLink, CollectionCard, SavedCard};
use cardtrade_core::filter::ListingKind;
use cardtrade_core::listing::{Card, CardDetails, Listing};
use cardtrade_core::shipping::{PostalCode, ShippingMethod, ShippingOption};
use cardtrade_core::{
    AccountId, CardId, CategoryId, ListingId, MessageId, ParticipantId, SavedCardId,
};

use super::users::UserProfile;
use super::wire::{
    CardRecord, CategoryLinkRecord, CategoryRecord, CollectionCardRecord, ConversationRow,
    ListingRecord, MessageRecord, RELAY_METHOD, SavedCardRecord, ShippingOptionRecord, UserRecord,
};
use super::ApiError;

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl UserProfile {
    pub(super) fn from_record(id: AccountId, record: UserRecord) -> Self {
        Self {
            id,
            pseudo: non_blank(record.pseudo),
            email: non_blank(record.email),
            paypal: non_blank(record.paypal),
            delivery: DeliveryProfile {
                first_name: record.first_name.unwrap_or_default(),
                last_name: record.last_name.unwrap_or_default(),
                address: record.address.unwrap_or_default(),
                postal_code: record.postal_code.unwrap_or_default(),
                city: record.city.unwrap_or_default(),
                country: record.country.unwrap_or_default(),
            },
        }
    }
}

/// Conversation list row as seen by `viewer`.
pub(super) fn convert_conversation_row(
    row: ConversationRow,
    viewer: &ParticipantId,
) -> Result<ConversationSummary, ApiError> {
    let id = ConversationId::parse(&row.conversation_id)
        .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
    let other = match row.other_user_id {
        Some(other) => other,
        None => id
            .other_participant(viewer)
            .cloned()
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("{viewer} is not part of conversation {id}"))
            })?,
    };
    Ok(ConversationSummary {
        other_pseudonym: non_blank(row.other_user_pseudo)
            .unwrap_or_else(|| DEFAULT_PSEUDONYM.to_owned()),
        last_message: row.last_message.unwrap_or_default(),
        last_message_at: row.last_message_timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        unread_count: row
            .unread_count
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        other_participant: other,
        id,
    })
}

/// Stored message of conversation `id`.
///
/// Older rows have no receiver; it is the other participant of the id.
pub(super) fn convert_message(
    record: MessageRecord,
    id: &ConversationId,
) -> Result<Message, ApiError> {
    let recipient = match record.receiver_id {
        Some(recipient) => recipient,
        None => id
            .other_participant(&record.sender_id)
            .cloned()
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!(
                    "sender {} is not part of conversation {id}",
                    record.sender_id
                ))
            })?,
    };
    Ok(Message {
        id: MessageId::new(record.id.unwrap_or_default()),
        sender: record.sender_id,
        recipient,
        content: record.content,
        kind: MessageKind::Text,
        sent_at: record.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        read: record.is_read,
    })
}

/// Marketplace listing; records without an id are dropped.
pub(super) fn convert_listing(mut record: ListingRecord) -> Option<Listing> {
    let Some(id) = record.id else {
        tracing::debug!(name = %record.name, "Skipping listing without id");
        return None;
    };
    let kind = record
        .kind
        .as_deref()
        .and_then(|k| k.parse::<ListingKind>().ok())
        .unwrap_or_default();
    let price = record.asking_price();
    let seller_id = record.seller().map(AccountId::new);
    let photo = record.take_photo();
    Some(Listing {
        id: ListingId::new(id),
        card_id: record.card_id.map(CardId::new),
        seller_id,
        name: record.name,
        year: record.year.and_then(|y| i32::try_from(y).ok()),
        card_set: non_blank(record.card_set.or(record.set)),
        number: non_blank(record.number),
        attributes: flatten_attributes(record.attributes),
        kind,
        price,
        photo: non_blank(photo),
        status: non_blank(record.status),
    })
}

fn flatten_attributes(value: Option<serde_json::Value>) -> Vec<(String, String)> {
    match value {
        Some(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect(),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
            vec![("info".to_owned(), s)]
        }
        _ => Vec::new(),
    }
}

/// Catalogue card; records without an id are dropped.
pub(super) fn convert_card(record: CardRecord) -> Option<Card> {
    Some(Card {
        id: non_blank(record.id.or(record.object_id))?,
        name: record.name,
        year: record.year.and_then(|y| i32::try_from(y).ok()),
        card_set: non_blank(record.card_set.or(record.set)),
        number: non_blank(record.number),
        image_url: non_blank(record.image_url.or(record.photo)),
    })
}

/// Attributes as one line of text: a plain string stays as is, an object
/// becomes `key: value` pairs.
fn attributes_text(value: Option<serde_json::Value>) -> Option<String> {
    if let Some(serde_json::Value::String(s)) = value {
        return non_blank(Some(s));
    }
    let pairs = flatten_attributes(value);
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn card_details(
    name: String,
    year: Option<i64>,
    card_set: Option<String>,
    number: Option<String>,
    attributes: Option<serde_json::Value>,
) -> CardDetails {
    CardDetails {
        name,
        year: year.and_then(|y| i32::try_from(y).ok()),
        card_set: non_blank(card_set),
        number: non_blank(number),
        attributes: attributes_text(attributes),
    }
}

/// Collection card; rows without a card id are dropped.
pub(super) fn convert_collection_card(record: CollectionCardRecord) -> Option<CollectionCard> {
    let Some(id) = record.id.or(record.cards_id) else {
        tracing::debug!(name = %record.name, "Skipping collection card without id");
        return None;
    };
    Some(CollectionCard {
        id: CardId::new(id),
        details: card_details(
            record.name,
            record.year,
            record.card_set.or(record.set),
            record.number,
            record.attributes,
        ),
        photo: non_blank(record.photo.or(record.image_url)),
    })
}

pub(super) fn convert_category(record: CategoryRecord) -> Option<Category> {
    Some(Category {
        id: CategoryId::new(record.id?),
        name: record.name,
        card_count: record
            .card_count
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
    })
}

pub(super) fn convert_category_link(record: &CategoryLinkRecord) -> Option<CategoryLink> {
    Some(CategoryLink {
        category_id: CategoryId::new(record.category_id?),
        card_id: CardId::new(record.card_id?),
    })
}

pub(super) fn convert_saved_card(record: SavedCardRecord) -> Option<SavedCard> {
    Some(SavedCard {
        id: SavedCardId::new(record.id?),
        card_id: record.card_id.map(CardId::new),
        details: card_details(
            record.name,
            record.year,
            record.card_set,
            record.number,
            record.attributes,
        ),
    })
}

/// Shipping option. Located relay points take their postal code from the
/// description, then from `searched`.
///
/// A located point without any postal code cannot be delivered to and is
/// dropped.
pub(super) fn convert_shipping_option(
    record: ShippingOptionRecord,
    searched: Option<&PostalCode>,
) -> Option<ShippingOption> {
    let method = if record.method == RELAY_METHOD {
        if record.is_specific_point {
            let postal_code = record
                .description
                .as_deref()
                .and_then(PostalCode::find_in)
                .or_else(|| searched.cloned());
            let Some(postal_code) = postal_code else {
                tracing::warn!(id = %record.id, "Relay point without postal code");
                return None;
            };
            ShippingMethod::RelayPoint { postal_code }
        } else {
            ShippingMethod::RelayCategory
        }
    } else {
        ShippingMethod::Flat {
            carrier: record.method,
        }
    };
    Some(ShippingOption {
        id: record.id,
        name: record.name,
        description: non_blank(record.description),
        price: record.price,
        method,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse<T: serde::de::DeserializeOwned>(json: &str) -> T {
        serde_json::from_str(json).unwrap()
    }

    fn account(id: i64) -> ParticipantId {
        AccountId::new(id).into()
    }

    #[test]
    fn test_row_without_other_id_uses_conversation_id() {
        let row: ConversationRow = parse(
            r#"{"conversation_id": "3_8", "last_message": "ok", "unread_count": "2"}"#,
        );
        let summary = convert_conversation_row(row, &account(8)).unwrap();
        assert_eq!(summary.other_participant, account(3));
        assert_eq!(summary.other_pseudonym, DEFAULT_PSEUDONYM);
        assert_eq!(summary.unread_count, 2);
    }

    #[test]
    fn test_row_with_bad_id_is_invalid() {
        let row: ConversationRow = parse(r#"{"conversation_id": "nope"}"#);
        assert!(matches!(
            convert_conversation_row(row, &account(1)),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_message_without_receiver() {
        let id = ConversationId::parse("3_8").unwrap();
        let record: MessageRecord = parse(r#"{"id": 1, "sender_id": 3, "content": "hello"}"#);
        let message = convert_message(record, &id).unwrap();
        assert_eq!(message.recipient, account(8));
        assert!(!message.read);
    }

    #[test]
    fn test_listing_attributes_and_kind() {
        let record: ListingRecord = parse(
            r#"{"id": 5, "name": "Mew", "type": "Échange", "attributes": {"Etat": "Near Mint", "Grade": 9}}"#,
        );
        let listing = convert_listing(record).unwrap();
        assert_eq!(listing.kind, ListingKind::Exchange);
        assert!(listing.attributes.contains(&("Etat".to_owned(), "Near Mint".to_owned())));
        assert!(listing.attributes.contains(&("Grade".to_owned(), "9".to_owned())));
    }

    #[test]
    fn test_shipping_methods() {
        let generic: ShippingOptionRecord =
            parse(r#"{"id": "relay", "name": "Point Relais", "price": 3.49, "type": "point_relais"}"#);
        let generic = convert_shipping_option(generic, None).unwrap();
        assert_eq!(generic.method, ShippingMethod::RelayCategory);

        let point: ShippingOptionRecord = parse(
            r#"{"id": "PR-1", "name": "Point Relais A (69002)", "description": "Tabac du Centre, 12 Rue Principale",
                "price": 3.49, "type": "point_relais", "isSpecificPoint": true}"#,
        );
        let searched = PostalCode::parse("69002").unwrap();
        let point = convert_shipping_option(point, Some(&searched)).unwrap();
        assert_eq!(
            point.method,
            ShippingMethod::RelayPoint {
                postal_code: searched
            }
        );

        let flat: ShippingOptionRecord =
            parse(r#"{"id": 1, "name": "Colissimo", "price": "5.90", "type": "colissimo"}"#);
        let flat = convert_shipping_option(flat, None).unwrap();
        assert!(!flat.is_relay());
    }

    #[test]
    fn test_collection_card_attributes_and_id() {
        let record: CollectionCardRecord = parse(
            r#"{"cards_id": "58", "name": "Pikachu", "year": "1999", "set": "Set de base",
                "number": 58, "attributes": {"Etat": "Mint", "Langue": "FR"}, "image_url": " "}"#,
        );
        let card = convert_collection_card(record).unwrap();
        assert_eq!(card.id, CardId::new(58));
        assert_eq!(card.details.card_set.as_deref(), Some("Set de base"));
        assert_eq!(card.details.number.as_deref(), Some("58"));
        assert_eq!(card.details.attributes.as_deref(), Some("Etat: Mint, Langue: FR"));
        assert!(card.photo.is_none());

        let record: CollectionCardRecord = parse(r#"{"name": "Sans id"}"#);
        assert!(convert_collection_card(record).is_none());
    }

    #[test]
    fn test_category_count_and_links() {
        let category = convert_category(parse(r#"{"id": 4, "name": "Holos", "cardCount": "3"}"#));
        assert_eq!(category.unwrap().card_count, 3);
        assert!(convert_category(parse(r#"{"name": "Sans id"}"#)).is_none());

        let link = convert_category_link(&parse(r#"{"category_id": "4", "card_id": 58}"#));
        assert_eq!(link.unwrap().card_id, CardId::new(58));
        assert!(convert_category_link(&parse(r#"{"category_id": 4}"#)).is_none());
    }
}
