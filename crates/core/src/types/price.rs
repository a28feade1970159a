//! Type-safe price representation using decimal arithmetic.
//!
//! Listing prices and shipping rates come from the backend as JSON numbers
//! (`3.49`) or strings (`"12.50"`). They are held as [`Decimal`] so that
//! totals add up exactly: `12.50 + 3.49` is `15.99`, not `15.990000000000002`.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Symbol appended to every displayed amount.
pub const CURRENCY_SYMBOL: &str = "€";

/// An amount in the marketplace currency.
///
/// Serialized transparently as the decimal amount; the currency is implicit
/// (the backend only deals in euros).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero euros.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer number of cents.
    ///
    /// ```
    /// use cardtrade_core::Price;
    /// assert_eq!(Price::from_cents(349).to_string(), "3.49 €");
    /// ```
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {CURRENCY_SYMBOL}", self.0.round_dp(2))
    }
}

impl core::str::FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().replace(',', ".").parse::<Decimal>().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_is_exact() {
        let total: Price = [Price::from_cents(1250), Price::from_cents(349)]
            .iter()
            .sum();
        assert_eq!(total, Price::from_cents(1599));
    }

    #[test]
    fn test_empty_sum_is_zero() {
        let total: Price = Vec::<Price>::new().into_iter().sum();
        assert!(total.is_zero());
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Price::from_cents(1500).to_string(), "15.00 €");
        assert_eq!("7.5".parse::<Price>().unwrap().to_string(), "7.50 €");
    }

    #[test]
    fn test_parse_accepts_french_comma() {
        assert_eq!("3,49".parse::<Price>().unwrap(), Price::from_cents(349));
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let from_number: Price = serde_json::from_str("3.49").unwrap();
        let from_string: Price = serde_json::from_str("\"3.49\"").unwrap();
        assert_eq!(from_number, Price::from_cents(349));
        assert_eq!(from_string, Price::from_cents(349));
    }
}
