//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

use core::num::ParseIntError;

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i64` (the backend's integer keys) with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>`, `Into<i64>`, `Display` and `FromStr` implementations
///
/// # Example
///
/// ```rust
/// # use cardtrade_core::define_id;
/// define_id!(SellerId);
/// define_id!(OfferId);
///
/// let seller = SellerId::new(1);
/// let offer: OfferId = "1".parse().unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: SellerId = offer;
/// # let _ = (seller, offer);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Internal account ids, distinct from identity-provider uids.
define_id!(AccountId);
define_id!(CardId);
define_id!(ListingId);
define_id!(CartItemId);
define_id!(MessageId);
define_id!(CategoryId);
define_id!(SavedCardId);

/// Parse any numeric ID from user input (CLI arguments, deep links).
///
/// # Errors
///
/// Returns the integer parse error if `s` is not a base-10 integer.
pub fn parse_id<T: From<i64>>(s: &str) -> Result<T, ParseIntError> {
    s.trim().parse::<i64>().map(T::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_orders_numerically() {
        assert!(AccountId::new(9) < AccountId::new(10));
    }

    #[test]
    fn test_from_str_trims_whitespace() {
        let id: ListingId = " 42 ".parse().unwrap();
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn test_from_str_rejects_non_numeric() {
        assert!("abc".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&CardId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: CardId = serde_json::from_str("7").unwrap();
        assert_eq!(back, CardId::new(7));
    }

    #[test]
    fn test_parse_id_generic() {
        let id: MessageId = parse_id("15").unwrap();
        assert_eq!(i64::from(id), 15);
    }
}
