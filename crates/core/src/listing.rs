//! Marketplace listings, listing drafts and catalogue cards.

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLineItem;
use crate::filter::{ListingKind, MarketplaceQuery, Searchable, TextFilter};
use crate::types::{AccountId, CardId, CartItemId, ListingId, Price};

/// A card offered on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub card_id: Option<CardId>,
    pub seller_id: Option<AccountId>,
    pub name: String,
    pub year: Option<i32>,
    pub card_set: Option<String>,
    pub number: Option<String>,
    /// Free-form attributes, flattened to `key: value` pairs.
    pub attributes: Vec<(String, String)>,
    pub kind: ListingKind,
    pub price: Option<Price>,
    pub photo: Option<String>,
    pub status: Option<String>,
}

impl Listing {
    /// Sale listings can be bought; exchanges only negotiated by message.
    #[must_use]
    pub fn is_for_sale(&self) -> bool {
        self.kind == ListingKind::Sale
            && self.price.is_some()
            && self.status.as_deref().is_none_or(|s| s == "available")
    }

    /// Snapshot this listing into a cart line.
    ///
    /// Returns `None` unless the listing is for sale and has a known seller.
    #[must_use]
    pub fn to_cart_line(&self, id: CartItemId, added_at: DateTime<Utc>) -> Option<CartLineItem> {
        if !self.is_for_sale() {
            return None;
        }
        Some(CartLineItem {
            id,
            listing_id: self.id,
            card_id: self.card_id,
            seller_id: self.seller_id?,
            title: self.title(),
            unit_price: self.price?,
            added_at,
        })
    }

    /// "Name (year)" as shown in the cart.
    #[must_use]
    pub fn title(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({year})", self.name),
            None => self.name.clone(),
        }
    }
}

impl Searchable for Listing {
    fn searchable_fields(&self) -> Vec<String> {
        let mut fields = vec![self.name.clone()];
        fields.extend(self.year.map(|y| y.to_string()));
        fields.extend(self.card_set.clone());
        fields.extend(self.number.clone());
        fields.extend(self.attributes.iter().map(|(k, v)| format!("{k} {v}")));
        fields
    }
}

impl MarketplaceQuery {
    /// Evaluate this query locally, with the same meaning as the backend
    /// search. Price bounds are inclusive.
    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        if self.kind != ListingKind::All && listing.kind != self.kind {
            return false;
        }
        if let Some((min, max)) = self.price.bounds() {
            let Some(price) = listing.price else {
                return false;
            };
            let amount = price.amount();
            if amount < Decimal::from(min) || amount > Decimal::from(max) {
                return false;
            }
        }
        TextFilter::new(&self.text).matches(&listing.searchable_fields())
    }
}

// =============================================================================
// Drafts
// =============================================================================

/// Required descriptive field of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardField {
    Name,
    Year,
    Set,
    Number,
}

impl fmt::Display for CardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Year => "year",
            Self::Set => "set",
            Self::Number => "number",
        })
    }
}

/// Why a card or listing draft cannot be submitted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("card details are incomplete (missing: {})", format_fields(.missing))]
    MissingFields { missing: Vec<CardField> },

    #[error("choose sale or exchange")]
    NoKind,

    /// Sales need a positive price.
    #[error("a sale needs a price")]
    MissingPrice,
}

fn format_fields(fields: &[CardField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Descriptive fields of a physical card, as typed by its owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub name: String,
    pub year: Option<i32>,
    pub card_set: Option<String>,
    pub number: Option<String>,
    /// Free text such as condition or language.
    pub attributes: Option<String>,
}

impl CardDetails {
    /// Required fields that are empty, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<CardField> {
        let blank = |value: Option<&str>| value.is_none_or(|v| v.trim().is_empty());
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push(CardField::Name);
        }
        if self.year.is_none() {
            missing.push(CardField::Year);
        }
        if blank(self.card_set.as_deref()) {
            missing.push(CardField::Set);
        }
        if blank(self.number.as_deref()) {
            missing.push(CardField::Number);
        }
        missing
    }

    /// # Errors
    ///
    /// Returns [`DraftError::MissingFields`] unless name, year, set and
    /// number are all filled in.
    pub fn validate(&self) -> Result<(), DraftError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DraftError::MissingFields { missing })
        }
    }
}

impl Searchable for CardDetails {
    fn searchable_fields(&self) -> Vec<String> {
        let mut fields = vec![self.name.clone()];
        fields.extend(self.year.map(|y| y.to_string()));
        fields.extend(self.card_set.clone());
        fields.extend(self.number.clone());
        fields.extend(self.attributes.clone());
        fields
    }
}

/// Check that `kind` is a sale or an exchange, and that a sale has a
/// positive price.
///
/// # Errors
///
/// Returns [`DraftError::NoKind`] or [`DraftError::MissingPrice`].
pub fn check_offer(kind: ListingKind, price: Option<Price>) -> Result<(), DraftError> {
    match kind {
        ListingKind::All => Err(DraftError::NoKind),
        ListingKind::Sale if !price.is_some_and(|p| p.amount() > Decimal::ZERO) => {
            Err(DraftError::MissingPrice)
        }
        ListingKind::Sale | ListingKind::Exchange => Ok(()),
    }
}

/// A card about to be offered on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingDraft {
    pub card_id: CardId,
    pub details: CardDetails,
    pub photo: Option<String>,
    pub kind: ListingKind,
    pub price: Option<Price>,
}

impl ListingDraft {
    /// # Errors
    ///
    /// See [`check_offer`].
    pub fn validate(&self) -> Result<(), DraftError> {
        check_offer(self.kind, self.price)
    }

    /// Price sent with the listing; exchanges never carry one.
    #[must_use]
    pub fn asking_price(&self) -> Option<Price> {
        if self.kind == ListingKind::Sale {
            self.price
        } else {
            None
        }
    }
}

/// A card from the reference catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Catalogue key; search results use string object ids.
    pub id: String,
    pub name: String,
    pub year: Option<i32>,
    pub card_set: Option<String>,
    pub number: Option<String>,
    pub image_url: Option<String>,
}

impl Searchable for Card {
    fn searchable_fields(&self) -> Vec<String> {
        let mut fields = vec![self.name.clone()];
        fields.extend(self.year.map(|y| y.to_string()));
        fields.extend(self.card_set.clone());
        fields.extend(self.number.clone());
        fields
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::filter::PriceBucket;

    fn listing(id: i64, name: &str, kind: ListingKind, cents: Option<i64>) -> Listing {
        Listing {
            id: ListingId::new(id),
            card_id: Some(CardId::new(id + 1000)),
            seller_id: Some(AccountId::new(42)),
            name: name.to_owned(),
            year: Some(1999),
            card_set: Some("Set de Base".to_owned()),
            number: Some("4".to_owned()),
            attributes: vec![("Etat".to_owned(), "Mint".to_owned())],
            kind,
            price: cents.map(Price::from_cents),
            photo: None,
            status: Some("available".to_owned()),
        }
    }

    #[test]
    fn test_query_matches_price_inclusive() {
        let query = MarketplaceQuery {
            price: PriceBucket::UpTo10,
            ..Default::default()
        };
        assert!(query.matches(&listing(1, "Pikachu", ListingKind::Sale, Some(1000))));
        assert!(!query.matches(&listing(2, "Pikachu", ListingKind::Sale, Some(1001))));
        assert!(!query.matches(&listing(3, "Pikachu", ListingKind::Exchange, None)));
    }

    #[test]
    fn test_query_matches_kind_and_text() {
        let query = MarketplaceQuery {
            text: "dracaufeu mint".to_owned(),
            kind: ListingKind::Exchange,
            ..Default::default()
        };
        assert!(query.matches(&listing(1, "Dracaufeu", ListingKind::Exchange, None)));
        assert!(!query.matches(&listing(2, "Dracaufeu", ListingKind::Sale, Some(500))));
        assert!(!query.matches(&listing(3, "Tortank", ListingKind::Exchange, None)));
    }

    #[test]
    fn test_to_cart_line() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let line = listing(7, "Pikachu", ListingKind::Sale, Some(1250))
            .to_cart_line(CartItemId::new(1), at)
            .unwrap();
        assert_eq!(line.title, "Pikachu (1999)");
        assert_eq!(line.unit_price, Price::from_cents(1250));
        assert_eq!(line.seller_id, AccountId::new(42));

        let exchange = listing(8, "Pikachu", ListingKind::Exchange, None);
        assert!(exchange.to_cart_line(CartItemId::new(2), at).is_none());

        let mut sold = listing(9, "Pikachu", ListingKind::Sale, Some(100));
        sold.status = Some("sold".to_owned());
        assert!(sold.to_cart_line(CartItemId::new(3), at).is_none());
    }

    fn details() -> CardDetails {
        CardDetails {
            name: "Dracaufeu".to_owned(),
            year: Some(1999),
            card_set: Some("Set de Base".to_owned()),
            number: Some("4".to_owned()),
            attributes: None,
        }
    }

    #[test]
    fn test_card_details_missing_fields() {
        assert!(details().validate().is_ok());

        let partial = CardDetails {
            name: "  ".to_owned(),
            number: Some(String::new()),
            ..details()
        };
        assert_eq!(
            partial.validate(),
            Err(DraftError::MissingFields {
                missing: vec![CardField::Name, CardField::Number]
            })
        );
        assert_eq!(
            CardDetails::default().missing_fields(),
            [CardField::Name, CardField::Year, CardField::Set, CardField::Number]
        );
    }

    #[test]
    fn test_draft_needs_kind_and_sale_price() {
        let mut draft = ListingDraft {
            card_id: CardId::new(4),
            details: details(),
            photo: None,
            kind: ListingKind::All,
            price: None,
        };
        assert_eq!(draft.validate(), Err(DraftError::NoKind));

        draft.kind = ListingKind::Sale;
        assert_eq!(draft.validate(), Err(DraftError::MissingPrice));
        draft.price = Some(Price::from_cents(0));
        assert_eq!(draft.validate(), Err(DraftError::MissingPrice));
        draft.price = Some(Price::from_cents(1250));
        assert!(draft.validate().is_ok());
        assert_eq!(draft.asking_price(), Some(Price::from_cents(1250)));

        draft.kind = ListingKind::Exchange;
        assert!(draft.validate().is_ok());
        assert_eq!(draft.asking_price(), None);
    }
}
