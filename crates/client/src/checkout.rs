//! Checkout session: the [`Checkout`] calculator wired to the backend.

use tracing::{info, instrument, warn};

use cardtrade_core::AccountId;
use cardtrade_core::cart::Cart;
use cardtrade_core::checkout::Checkout;

use crate::api::{ApiClient, CheckoutRedirect, CheckoutRequest};
use crate::error::{ClientError, add_breadcrumb};

/// One checkout in progress for a signed-in buyer.
#[derive(Debug)]
pub struct CheckoutSession {
    api: ApiClient,
    buyer: AccountId,
    checkout: Checkout,
}

impl CheckoutSession {
    /// Load the buyer's delivery profile and the shipping options, then
    /// start a checkout for `cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails.
    #[instrument(skip(api, cart), fields(items = cart.count()))]
    pub async fn load(api: ApiClient, buyer: AccountId, cart: Cart) -> Result<Self, ClientError> {
        let (profile, options) = tokio::try_join!(api.get_profile(buyer), api.shipping_options())?;
        Ok(Self {
            api,
            buyer,
            checkout: Checkout::new(cart, profile.delivery, options),
        })
    }

    #[must_use]
    pub const fn buyer(&self) -> AccountId {
        self.buyer
    }

    #[must_use]
    pub const fn checkout(&self) -> &Checkout {
        &self.checkout
    }

    /// Local edits: cart, option selection, postal code.
    pub const fn checkout_mut(&mut self) -> &mut Checkout {
        &mut self.checkout
    }

    /// Search relay points for the entered postal code and show them.
    ///
    /// Returns the number of points found. When the search fails the base
    /// option list is restored before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid postal code or a failed request.
    #[instrument(skip(self), fields(postal_code = %self.checkout.postal_code()))]
    pub async fn search_relay_points(&mut self) -> Result<usize, ClientError> {
        let postal_code = self.checkout.relay_search_postal_code()?;
        match self.api.relay_points(&postal_code).await {
            Ok(points) => {
                let found = points.len();
                self.checkout.apply_relay_search(points);
                Ok(found)
            }
            Err(e) => {
                warn!(error = %e, "Relay point search failed");
                self.checkout.apply_relay_search(Vec::new());
                Err(e.into())
            }
        }
    }

    /// Place the order and get the payment redirect.
    ///
    /// # Errors
    ///
    /// Returns the checkout blocker when the order cannot be placed yet, or
    /// an error if the request fails.
    #[instrument(skip(self), fields(buyer = %self.buyer))]
    pub async fn submit(&self) -> Result<CheckoutRedirect, ClientError> {
        let summary = self.checkout.summary()?;
        let request = CheckoutRequest::new(self.buyer, summary);
        let redirect = self.api.checkout(&request).await?;
        info!(order_id = ?redirect.order_id, "Order created");
        add_breadcrumb(
            "checkout",
            "Order submitted",
            Some(&[("shipping_option_id", request.shipping_option_id.as_str())]),
        );
        Ok(redirect)
    }
}
