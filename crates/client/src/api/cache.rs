//! Cache types for backend responses.

use cardtrade_core::AccountId;
use cardtrade_core::shipping::ShippingOption;

use super::UserProfile;

/// Cache key for profiles and shipping options.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Profile(AccountId),
    ShippingOptions,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Profile(Box<UserProfile>),
    ShippingOptions(Vec<ShippingOption>),
}
