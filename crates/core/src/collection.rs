//! Personal card collections, categories and saved cards.
//!
//! A collection is the set of cards a user owns. Cards can be grouped into
//! named categories; the backend stores the grouping as `(category, card)`
//! links separate from the cards themselves, so a category view joins the
//! two and then applies the free-text search of the screen.

use serde::{Deserialize, Serialize};

use crate::filter::{Searchable, TextFilter};
use crate::listing::CardDetails;
use crate::types::{CardId, CategoryId, SavedCardId};

/// Errors raised by collection edits before anything is sent.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// An import file without any card identifier.
    #[error("nothing to import")]
    EmptyImport,
}

/// A card owned by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCard {
    pub id: CardId,
    pub details: CardDetails,
    pub photo: Option<String>,
}

impl Searchable for CollectionCard {
    fn searchable_fields(&self) -> Vec<String> {
        self.details.searchable_fields()
    }
}

/// A named group of collection cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub card_count: u32,
}

/// Membership of one card in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryLink {
    pub category_id: CategoryId,
    pub card_id: CardId,
}

/// Trimmed category name.
///
/// # Errors
///
/// Returns [`CollectionError::EmptyCategoryName`] for a blank name.
pub fn category_name(name: &str) -> Result<&str, CollectionError> {
    let name = name.trim();
    if name.is_empty() {
        Err(CollectionError::EmptyCategoryName)
    } else {
        Ok(name)
    }
}

/// Cards of `category` matching every term of `search`, in collection order.
#[must_use]
pub fn category_cards<'a>(
    cards: &'a [CollectionCard],
    links: &[CategoryLink],
    category: CategoryId,
    search: &str,
) -> Vec<&'a CollectionCard> {
    let filter = TextFilter::new(search);
    cards
        .iter()
        .filter(|card| {
            links
                .iter()
                .any(|link| link.category_id == category && link.card_id == card.id)
        })
        .filter(|card| filter.matches(&card.searchable_fields()))
        .collect()
}

/// Card identifiers of an import file, one per non-blank line.
///
/// # Errors
///
/// Returns [`CollectionError::EmptyImport`] when no line holds an identifier.
pub fn parse_card_identifiers(text: &str) -> Result<Vec<String>, CollectionError> {
    let identifiers: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    if identifiers.is_empty() {
        Err(CollectionError::EmptyImport)
    } else {
        Ok(identifiers)
    }
}

/// A catalogue card bookmarked by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCard {
    pub id: SavedCardId,
    pub card_id: Option<CardId>,
    pub details: CardDetails,
}

impl Searchable for SavedCard {
    fn searchable_fields(&self) -> Vec<String> {
        self.details.searchable_fields()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn card(id: i64, name: &str, set: &str, number: &str) -> CollectionCard {
        CollectionCard {
            id: CardId::new(id),
            details: CardDetails {
                name: name.to_owned(),
                year: Some(1999),
                card_set: Some(set.to_owned()),
                number: Some(number.to_owned()),
                attributes: None,
            },
            photo: None,
        }
    }

    fn link(category: i64, card: i64) -> CategoryLink {
        CategoryLink {
            category_id: CategoryId::new(category),
            card_id: CardId::new(card),
        }
    }

    fn names(cards: &[&CollectionCard]) -> Vec<String> {
        cards.iter().map(|c| c.details.name.clone()).collect()
    }

    #[test]
    fn test_category_cards_joins_links() {
        let cards = [
            card(1, "Dracaufeu", "Set de Base", "4"),
            card(2, "Pikachu", "Set de Base", "58"),
            card(3, "Mew", "Promo", "8"),
        ];
        let links = [link(10, 3), link(10, 1), link(11, 2)];

        let shown = category_cards(&cards, &links, CategoryId::new(10), "");
        assert_eq!(names(&shown), ["Dracaufeu", "Mew"]);
        assert!(category_cards(&cards, &links, CategoryId::new(12), "").is_empty());
    }

    #[test]
    fn test_category_cards_text_is_and_of_terms() {
        let cards = [
            card(1, "Dracaufeu", "Set de Base", "4"),
            card(2, "Dracaufeu", "Promo", "4"),
            card(3, "Pikachu", "Set de Base", "58"),
        ];
        let links = [link(10, 1), link(10, 2), link(10, 3)];

        let shown = category_cards(&cards, &links, CategoryId::new(10), "base 4");
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, CardId::new(1));
        let shown = category_cards(&cards, &links, CategoryId::new(10), "1999 BASE");
        assert_eq!(names(&shown), ["Dracaufeu", "Pikachu"]);
    }

    #[test]
    fn test_category_name_trimmed() {
        assert_eq!(category_name("  Holos ").unwrap(), "Holos");
        assert_eq!(category_name(" \t"), Err(CollectionError::EmptyCategoryName));
    }

    #[test]
    fn test_parse_card_identifiers() {
        let ids = parse_card_identifiers("base1-4\r\n\n  neo-9 \n").unwrap();
        assert_eq!(ids, ["base1-4", "neo-9"]);
        assert_eq!(parse_card_identifiers("\n \n"), Err(CollectionError::EmptyImport));
    }
}
