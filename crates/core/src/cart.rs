//! Shopping cart.
//!
//! A cart holds listings from a single seller. Each line keeps the price the
//! listing had when it was added; later price changes on the listing do not
//! flow into the cart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, CardId, CartItemId, ListingId, Price};

/// Errors raised when editing a cart.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("listing {0} is already in the cart")]
    AlreadyInCart(ListingId),

    /// Orders ship from one seller; use `clear_and_add` to switch.
    #[error("cart holds items from seller {current}, cannot add from seller {incoming}")]
    DifferentSeller {
        current: AccountId,
        incoming: AccountId,
    },
}

/// One listing in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: CartItemId,
    pub listing_id: ListingId,
    pub card_id: Option<CardId>,
    pub seller_id: AccountId,
    pub title: String,
    /// Price snapshot taken when the line was added.
    pub unit_price: Price,
    pub added_at: DateTime<Utc>,
}

/// The buyer's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from lines loaded from the backend.
    #[must_use]
    pub const fn from_items(items: Vec<CartLineItem>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Seller of the current items, if any.
    #[must_use]
    pub fn seller(&self) -> Option<AccountId> {
        self.items.first().map(|item| item.seller_id)
    }

    /// Sum of the line price snapshots.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(|item| item.unit_price).sum()
    }

    /// Add a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::AlreadyInCart`] if the listing is present and
    /// [`CartError::DifferentSeller`] if the cart holds another seller's items.
    pub fn add(&mut self, item: CartLineItem) -> Result<(), CartError> {
        if self.items.iter().any(|i| i.listing_id == item.listing_id) {
            return Err(CartError::AlreadyInCart(item.listing_id));
        }
        if let Some(current) = self.seller()
            && current != item.seller_id
        {
            return Err(CartError::DifferentSeller {
                current,
                incoming: item.seller_id,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Empty the cart, then add `item`.
    pub fn clear_and_add(&mut self, item: CartLineItem) {
        self.items.clear();
        self.items.push(item);
    }

    /// Remove a line by id, returning it if present.
    pub fn remove(&mut self, id: CartItemId) -> Option<CartLineItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
