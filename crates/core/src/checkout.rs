//! Checkout calculation and gating.
//!
//! [`Checkout`] combines a cart, the buyer's delivery profile and the
//! shipping options on offer. Totals are derived from current state on every
//! call:
//!
//! ```text
//! subtotal = Σ line.unit_price
//! total    = subtotal + selected_option.price   (0 when nothing is selected)
//! ```
//!
//! Checkout is allowed only when the cart is non-empty, an option is
//! selected, and either a located relay point is selected or the profile
//! address is complete.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::shipping::{
    PostalCode, PostalCodeError, ShippingMethod, ShippingOption, base_options,
    replace_relay_entries,
};
use crate::types::{ListingId, Price};

/// Country used for relay point deliveries.
pub const RELAY_COUNTRY: &str = "FRANCE";

/// Name used when the profile has no first or last name.
pub const DEFAULT_FULL_NAME: &str = "Client";

/// Address fields required for home delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Address,
    PostalCode,
    City,
    Country,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Address => "address",
            Self::PostalCode => "postal code",
            Self::City => "city",
            Self::Country => "country",
        })
    }
}

/// Why checkout is currently disabled.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutBlocker {
    #[error("the cart is empty")]
    EmptyCart,

    #[error("no shipping option selected")]
    NoShippingOption,

    /// The relay category is selected but no located point was chosen.
    #[error("search and select a specific relay point")]
    RelayPointNotChosen,

    #[error("delivery address is incomplete (missing: {})", format_fields(.missing))]
    IncompleteAddress { missing: Vec<AddressField> },
}

fn format_fields(fields: &[AddressField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by checkout edits.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("unknown shipping option: {0}")]
    UnknownShippingOption(String),

    #[error(transparent)]
    InvalidPostalCode(#[from] PostalCodeError),

    #[error(transparent)]
    Blocked(#[from] CheckoutBlocker),
}

/// Buyer profile fields used for delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryProfile {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl DeliveryProfile {
    /// "Last First", trimmed, or [`DEFAULT_FULL_NAME`] when both are blank.
    #[must_use]
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.last_name.trim(), self.first_name.trim());
        let name = name.trim();
        if name.is_empty() {
            DEFAULT_FULL_NAME.to_owned()
        } else {
            name.to_owned()
        }
    }

    /// Required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<AddressField> {
        [
            (AddressField::Address, &self.address),
            (AddressField::PostalCode, &self.postal_code),
            (AddressField::City, &self.city),
            (AddressField::Country, &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// Where the parcel goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    /// Shipping method tag sent to the backend (`point_relais`, carrier code).
    #[serde(rename = "type")]
    pub method: String,
    /// Relay point name, for relay deliveries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ShippingAddress {
    fn lines(&self) -> String {
        match &self.name {
            Some(name) => format!("{name}\n{}", self.address),
            None => format!(
                "{}\n{} {}\n{}",
                self.address, self.postal_code, self.city, self.country
            ),
        }
    }
}

/// Figures shown in the order confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub listings: Vec<ListingId>,
    pub shipping_option_id: String,
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
    pub address: ShippingAddress,
}

impl OrderSummary {
    /// Confirmation dialog body.
    #[must_use]
    pub fn confirmation_text(&self) -> String {
        format!(
            "Sous-total: {}\nLivraison: {}\nTotal: {}\n\nAdresse de livraison:\n{}",
            self.subtotal,
            self.shipping,
            self.total,
            self.address.lines()
        )
    }
}

/// Cart + shipping + address state for one checkout screen.
#[derive(Debug, Clone)]
pub struct Checkout {
    cart: Cart,
    profile: DeliveryProfile,
    base_options: Vec<ShippingOption>,
    displayed_options: Vec<ShippingOption>,
    selected: Option<String>,
    postal_code: String,
}

impl Checkout {
    /// Start a checkout. Located relay points in `options` are discarded; the
    /// search postal code starts as the profile's.
    #[must_use]
    pub fn new(cart: Cart, profile: DeliveryProfile, options: Vec<ShippingOption>) -> Self {
        let base_options = base_options(options);
        let postal_code = profile.postal_code.clone();
        Self {
            cart,
            profile,
            displayed_options: base_options.clone(),
            base_options,
            selected: None,
            postal_code,
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    pub const fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    #[must_use]
    pub const fn profile(&self) -> &DeliveryProfile {
        &self.profile
    }

    #[must_use]
    pub fn displayed_options(&self) -> &[ShippingOption] {
        &self.displayed_options
    }

    #[must_use]
    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    #[must_use]
    pub fn selected_option(&self) -> Option<&ShippingOption> {
        let id = self.selected.as_deref()?;
        self.displayed_options.iter().find(|o| o.id == id)
    }

    /// Select a displayed option by id.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownShippingOption`] if no displayed
    /// option has that id; the previous selection is kept.
    pub fn select_option(&mut self, id: &str) -> Result<(), CheckoutError> {
        if !self.displayed_options.iter().any(|o| o.id == id) {
            return Err(CheckoutError::UnknownShippingOption(id.to_owned()));
        }
        self.selected = Some(id.to_owned());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.cart.subtotal()
    }

    /// Price of the selected option, zero when none.
    #[must_use]
    pub fn shipping_cost(&self) -> Price {
        self.selected_option().map_or(Price::ZERO, |o| o.price)
    }

    #[must_use]
    pub fn total(&self) -> Price {
        self.subtotal() + self.shipping_cost()
    }

    /// Edit the relay search postal code.
    ///
    /// Any earlier search results are dropped from the displayed list. If a
    /// located relay point was selected, nothing is selected afterwards.
    pub fn set_postal_code(&mut self, postal_code: impl Into<String>) {
        self.postal_code = postal_code.into();
        let had_point = self
            .selected_option()
            .is_some_and(ShippingOption::is_located_relay_point);
        self.displayed_options.clone_from(&self.base_options);
        if had_point {
            self.selected = None;
        }
    }

    /// The postal code to search relay points for.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidPostalCode`] unless it is 5 digits.
    pub fn relay_search_postal_code(&self) -> Result<PostalCode, CheckoutError> {
        Ok(PostalCode::parse(&self.postal_code)?)
    }

    /// Show the located points from a relay search.
    ///
    /// With results, relay entries are replaced by the points and the first
    /// point is selected. Without results the base list is restored and the
    /// generic relay category (if offered) is selected, which still blocks
    /// checkout until a point is found.
    pub fn apply_relay_search(&mut self, points: Vec<ShippingOption>) {
        let displayed = replace_relay_entries(&self.base_options, points);
        let first_point = displayed
            .iter()
            .find(|o| o.is_located_relay_point())
            .map(|o| o.id.clone());

        if let Some(first) = first_point {
            self.displayed_options = displayed;
            self.selected = Some(first);
        } else {
            self.displayed_options.clone_from(&self.base_options);
            self.selected = self
                .base_options
                .iter()
                .find(|o| matches!(o.method, ShippingMethod::RelayCategory))
                .map(|o| o.id.clone());
        }
    }

    /// `Ok(())` when the order can be placed, otherwise the first blocker.
    ///
    /// # Errors
    ///
    /// Returns the [`CheckoutBlocker`] preventing checkout.
    pub fn readiness(&self) -> Result<(), CheckoutBlocker> {
        if self.cart.is_empty() {
            return Err(CheckoutBlocker::EmptyCart);
        }
        let option = self
            .selected_option()
            .ok_or(CheckoutBlocker::NoShippingOption)?;
        if option.is_relay() {
            if !option.is_located_relay_point() {
                return Err(CheckoutBlocker::RelayPointNotChosen);
            }
        } else {
            let missing = self.profile.missing_fields();
            if !missing.is_empty() {
                return Err(CheckoutBlocker::IncompleteAddress { missing });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn can_checkout(&self) -> bool {
        self.readiness().is_ok()
    }

    /// Delivery address for the current selection.
    ///
    /// # Errors
    ///
    /// Returns the [`CheckoutBlocker`] if checkout is not allowed.
    pub fn shipping_address(&self) -> Result<ShippingAddress, CheckoutBlocker> {
        self.readiness()?;
        let option = self
            .selected_option()
            .ok_or(CheckoutBlocker::NoShippingOption)?;
        let full_name = self.profile.full_name();

        let address = match &option.method {
            ShippingMethod::RelayPoint { postal_code } => {
                let description = option.description.clone().unwrap_or_default();
                let postal_code = PostalCode::find_in(&description)
                    .unwrap_or_else(|| postal_code.clone());
                let city = option
                    .name
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_owned();
                ShippingAddress {
                    full_name,
                    address: description,
                    postal_code: postal_code.to_string(),
                    city,
                    country: RELAY_COUNTRY.to_owned(),
                    method: "point_relais".to_owned(),
                    name: Some(option.name.clone()),
                }
            }
            ShippingMethod::Flat { carrier } => ShippingAddress {
                full_name,
                address: self.profile.address.trim().to_owned(),
                postal_code: self.profile.postal_code.trim().to_owned(),
                city: self.profile.city.trim().to_owned(),
                country: self.profile.country.trim().to_owned(),
                method: carrier.clone(),
                name: None,
            },
            ShippingMethod::RelayCategory => return Err(CheckoutBlocker::RelayPointNotChosen),
        };
        Ok(address)
    }

    /// Everything needed to confirm and submit the order.
    ///
    /// # Errors
    ///
    /// Returns the [`CheckoutBlocker`] if checkout is not allowed.
    pub fn summary(&self) -> Result<OrderSummary, CheckoutBlocker> {
        let address = self.shipping_address()?;
        let option = self
            .selected_option()
            .ok_or(CheckoutBlocker::NoShippingOption)?;
        Ok(OrderSummary {
            listings: self.cart.items().iter().map(|i| i.listing_id).collect(),
            shipping_option_id: option.id.clone(),
            subtotal: self.subtotal(),
            shipping: self.shipping_cost(),
            total: self.total(),
            address,
        })
    }
}
