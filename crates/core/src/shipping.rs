//! Shipping options and relay-point handling.
//!
//! The backend offers flat-rate carriers plus one generic "relay point"
//! entry. The generic entry only becomes a deliverable option once a
//! postal-code search has replaced it with concrete, located relay points.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Price;

/// How a shipping option is fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShippingMethod {
    /// Home delivery by a carrier at a fixed price.
    Flat { carrier: String },
    /// "Deliver to a relay point", before any point has been searched.
    RelayCategory,
    /// A concrete relay point returned by a postal-code search.
    RelayPoint { postal_code: PostalCode },
}

/// A selectable shipping option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub method: ShippingMethod,
}

impl ShippingOption {
    /// Relay category or located relay point.
    #[must_use]
    pub const fn is_relay(&self) -> bool {
        matches!(
            self.method,
            ShippingMethod::RelayCategory | ShippingMethod::RelayPoint { .. }
        )
    }

    /// Only a located point can actually receive a parcel.
    #[must_use]
    pub const fn is_located_relay_point(&self) -> bool {
        matches!(self.method, ShippingMethod::RelayPoint { .. })
    }
}

/// Options shown before any relay search: everything except located points.
#[must_use]
pub fn base_options(options: Vec<ShippingOption>) -> Vec<ShippingOption> {
    options
        .into_iter()
        .filter(|o| !o.is_located_relay_point())
        .collect()
}

/// Replace every relay entry of `base` with `points`.
///
/// Non-relay options keep their position and content; located points are
/// appended after them. Entries of `points` that are not located relay
/// points are dropped.
#[must_use]
pub fn replace_relay_entries(
    base: &[ShippingOption],
    points: Vec<ShippingOption>,
) -> Vec<ShippingOption> {
    base.iter()
        .filter(|o| !o.is_relay())
        .cloned()
        .chain(points.into_iter().filter(ShippingOption::is_located_relay_point))
        .collect()
}

/// Errors for postal code parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("postal code must be exactly 5 digits, got {0:?}")]
pub struct PostalCodeError(pub String);

/// A French postal code: exactly five ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    pub const LENGTH: usize = 5;

    /// Parse a postal code, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`PostalCodeError`] unless the trimmed input is five digits.
    pub fn parse(s: &str) -> Result<Self, PostalCodeError> {
        let trimmed = s.trim();
        if trimmed.len() == Self::LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(PostalCodeError(s.to_owned()))
        }
    }

    /// First standalone run of exactly five digits in free text, e.g. in a
    /// relay point description.
    #[must_use]
    pub fn find_in(text: &str) -> Option<Self> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .find(|word| word.len() == Self::LENGTH && word.bytes().all(|b| b.is_ascii_digit()))
            .map(|word| Self(word.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = PostalCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}
