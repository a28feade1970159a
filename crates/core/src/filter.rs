//! Marketplace filters, free-text matching and pagination.
//!
//! Two kinds of filtering happen on the client:
//! - building the server-side search query for the marketplace feed, where a
//!   filter left at its "all" value must be omitted entirely, and
//! - matching cards already in memory against a free-text search, where
//!   every search term must appear somewhere in the card's fields.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default page size of the card catalogue search.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound the backend uses for the open-ended price bucket.
pub const OPEN_PRICE_MAX: u32 = 999_999;

/// Error for unrecognised filter values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} filter: {value:?}")]
pub struct FilterParseError {
    kind: &'static str,
    value: String,
}

// =============================================================================
// Price buckets
// =============================================================================

/// Price range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PriceBucket {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "0-10")]
    UpTo10,
    #[serde(rename = "10-50")]
    From10To50,
    #[serde(rename = "50-999999")]
    Over50,
}

impl PriceBucket {
    /// `(priceMin, priceMax)`, or `None` for [`PriceBucket::All`].
    #[must_use]
    pub const fn bounds(self) -> Option<(u32, u32)> {
        match self {
            Self::All => None,
            Self::UpTo10 => Some((0, 10)),
            Self::From10To50 => Some((10, 50)),
            Self::Over50 => Some((50, OPEN_PRICE_MAX)),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::UpTo10 => "0-10",
            Self::From10To50 => "10-50",
            Self::Over50 => "50-999999",
        }
    }
}

impl FromStr for PriceBucket {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(Self::All),
            "0-10" => Ok(Self::UpTo10),
            "10-50" => Ok(Self::From10To50),
            "50+" | "50-999999" => Ok(Self::Over50),
            other => Err(FilterParseError {
                kind: "price",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Listing kinds
// =============================================================================

/// Listing type filter: sale or exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ListingKind {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "Vente")]
    Sale,
    #[serde(rename = "Échange")]
    Exchange,
}

impl ListingKind {
    /// Wire value, or `None` for [`ListingKind::All`].
    #[must_use]
    pub const fn wire_value(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Sale => Some("Vente"),
            Self::Exchange => Some("Échange"),
        }
    }
}

impl FromStr for ListingKind {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "vente" | "sale" => Ok(Self::Sale),
            "échange" | "echange" | "exchange" => Ok(Self::Exchange),
            _ => Err(FilterParseError {
                kind: "type",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value().unwrap_or("all"))
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Marketplace search parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketplaceQuery {
    pub text: String,
    pub price: PriceBucket,
    pub kind: ListingKind,
}

impl MarketplaceQuery {
    /// Query parameters in wire order. Sentinel values produce no parameter.
    ///
    /// ```
    /// use cardtrade_core::filter::{MarketplaceQuery, PriceBucket};
    ///
    /// let all = MarketplaceQuery::default();
    /// assert!(all.query_pairs().is_empty());
    ///
    /// let cheap = MarketplaceQuery { price: PriceBucket::UpTo10, ..Default::default() };
    /// assert_eq!(
    ///     cheap.query_pairs(),
    ///     vec![("priceMin", "0".to_string()), ("priceMax", "10".to_string())]
    /// );
    /// ```
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let text = self.text.trim();
        if !text.is_empty() {
            pairs.push(("q", text.to_owned()));
        }
        if let Some((min, max)) = self.price.bounds() {
            pairs.push(("priceMin", min.to_string()));
            pairs.push(("priceMax", max.to_string()));
        }
        if let Some(kind) = self.kind.wire_value() {
            pairs.push(("type", kind.to_owned()));
        }
        pairs
    }

    /// Percent-encoded query string without the leading `?`; empty when
    /// nothing is filtered.
    #[must_use]
    pub fn query_string(&self) -> String {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return String::new();
        }
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }

    /// No filter applies; the feed should list everything.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.query_pairs().is_empty()
    }
}

/// Card catalogue search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardSearchQuery {
    pub text: String,
    pub page: u32,
    pub limit: u32,
}

impl Default for CardSearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            page: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CardSearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    /// `q` only when non-blank; `page` and `limit` always.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        let text = self.text.trim();
        if !text.is_empty() {
            pairs.push(("q", text.to_owned()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

// =============================================================================
// Free-text filter
// =============================================================================

/// Anything that can be matched by [`TextFilter`].
pub trait Searchable {
    /// Field values to search in. Empty strings are skipped.
    fn searchable_fields(&self) -> Vec<String>;
}

/// Case-insensitive AND-of-substrings filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFilter {
    terms: Vec<String>,
}

impl TextFilter {
    /// Split the query on whitespace into lowercased terms.
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            terms: query.split_whitespace().map(str::to_lowercase).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Every term is a substring of the space-joined fields.
    #[must_use]
    pub fn matches<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let haystack = fields
            .iter()
            .map(AsRef::as_ref)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        self.terms.iter().all(|term| haystack.contains(term.as_str()))
    }

    /// Keep the items that match, preserving order.
    #[must_use]
    pub fn apply<'a, T: Searchable>(&self, items: &'a [T]) -> Vec<&'a T> {
        items
            .iter()
            .filter(|item| self.matches(&item.searchable_fields()))
            .collect()
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based page index.
    pub page: u32,
    /// Total number of pages, at least 1.
    pub nb_pages: u32,
}

/// Slice `items` into the zero-based `page` of size `per_page`.
///
/// Out-of-range pages are empty; `nb_pages` is never below 1.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page: u32, per_page: u32) -> Page<T> {
    let per_page = per_page.max(1) as usize;
    let nb_pages = items.len().div_ceil(per_page).max(1);
    let start = (page as usize).saturating_mul(per_page);
    let slice = items.get(start..).unwrap_or_default();
    Page {
        items: slice.iter().take(per_page).cloned().collect(),
        page,
        nb_pages: u32::try_from(nb_pages).unwrap_or(u32::MAX),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Card {
        name: &'static str,
        year: u16,
        set: &'static str,
        number: &'static str,
    }

    impl Searchable for Card {
        fn searchable_fields(&self) -> Vec<String> {
            vec![
                self.name.to_owned(),
                self.year.to_string(),
                self.set.to_owned(),
                self.number.to_owned(),
            ]
        }
    }

    fn cards() -> Vec<Card> {
        vec![
            Card {
                name: "Zinedine Zidane",
                year: 1998,
                set: "Panini World Cup",
                number: "12",
            },
            Card {
                name: "Thierry Henry",
                year: 2006,
                set: "Panini World Cup",
                number: "7",
            },
            Card {
                name: "Kylian Mbappé",
                year: 2018,
                set: "Topps Chrome",
                number: "1",
            },
        ]
    }

    #[test]
    fn test_all_filters_produce_no_params() {
        let query = MarketplaceQuery {
            text: "   ".to_owned(),
            ..Default::default()
        };
        assert!(query.query_pairs().is_empty());
        assert!(query.is_unfiltered());
    }

    #[test]
    fn test_price_bucket_params() {
        let query = MarketplaceQuery {
            price: PriceBucket::Over50,
            ..Default::default()
        };
        assert_eq!(
            query.query_pairs(),
            vec![
                ("priceMin", "50".to_owned()),
                ("priceMax", "999999".to_owned())
            ]
        );
    }

    #[test]
    fn test_query_string() {
        let cheap = MarketplaceQuery {
            price: PriceBucket::UpTo10,
            ..Default::default()
        };
        assert_eq!(cheap.query_string(), "priceMin=0&priceMax=10");
        assert_eq!(MarketplaceQuery::default().query_string(), "");

        let text = MarketplaceQuery {
            text: "pikachu holo".to_owned(),
            kind: ListingKind::Sale,
            ..Default::default()
        };
        assert_eq!(text.query_string(), "q=pikachu+holo&type=Vente");
    }

    #[test]
    fn test_full_query_order() {
        let query = MarketplaceQuery {
            text: " zidane 98 ".to_owned(),
            price: PriceBucket::From10To50,
            kind: ListingKind::Exchange,
        };
        let keys: Vec<&str> = query.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["q", "priceMin", "priceMax", "type"]);
        assert_eq!(query.query_pairs()[0].1, "zidane 98");
        assert_eq!(query.query_pairs()[3].1, "Échange");
    }

    #[test]
    fn test_filter_values_parse() {
        assert_eq!("0-10".parse::<PriceBucket>().unwrap(), PriceBucket::UpTo10);
        assert_eq!("50+".parse::<PriceBucket>().unwrap(), PriceBucket::Over50);
        assert!("5-6".parse::<PriceBucket>().is_err());
        assert_eq!("echange".parse::<ListingKind>().unwrap(), ListingKind::Exchange);
        assert_eq!("Vente".parse::<ListingKind>().unwrap(), ListingKind::Sale);
        assert_eq!("all".parse::<ListingKind>().unwrap(), ListingKind::All);
    }

    #[test]
    fn test_card_search_pairs() {
        let pairs = CardSearchQuery::new("", 2).query_pairs();
        assert_eq!(
            pairs,
            vec![("page", "2".to_owned()), ("limit", "20".to_owned())]
        );
    }

    #[test]
    fn test_text_filter_and_semantics() {
        let cards = cards();
        let hits = TextFilter::new("panini 2006").apply(&cards);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Thierry Henry");
    }

    #[test]
    fn test_text_filter_case_insensitive_substrings() {
        let cards = cards();
        let hits = TextFilter::new("ZID pan").apply(&cards);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Zinedine Zidane");
    }

    #[test]
    fn test_text_filter_missing_term_excludes() {
        let cards = cards();
        assert!(TextFilter::new("henry topps").apply(&cards).is_empty());
    }

    #[test]
    fn test_empty_text_filter_matches_all() {
        let cards = cards();
        assert_eq!(TextFilter::new("  ").apply(&cards).len(), 3);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..45).collect();
        let page = paginate(&items, 2, 20);
        assert_eq!(page.items, (40..45).collect::<Vec<_>>());
        assert_eq!(page.nb_pages, 3);

        let beyond = paginate(&items, 9, 20);
        assert!(beyond.items.is_empty());

        let empty = paginate::<u32>(&[], 0, 20);
        assert_eq!(empty.nb_pages, 1);
    }
}
