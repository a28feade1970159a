//! Order submission.

use serde::Serialize;
use tracing::instrument;
use url::Url;

use cardtrade_core::checkout::{OrderSummary, ShippingAddress};
use cardtrade_core::{AccountId, ListingId, Price};

use super::wire::CheckoutResponse;
use super::{ApiClient, ApiError};

/// Body of `POST /orders/checkout`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub user_id: AccountId,
    pub listing_ids: Vec<ListingId>,
    pub shipping_option_id: String,
    pub shipping_address: ShippingAddress,
    pub subtotal: Price,
    pub shipping_cost: Price,
    pub total: Price,
}

impl CheckoutRequest {
    #[must_use]
    pub fn new(buyer: AccountId, summary: OrderSummary) -> Self {
        Self {
            user_id: buyer,
            listing_ids: summary.listings,
            shipping_option_id: summary.shipping_option_id,
            shipping_address: summary.address,
            subtotal: summary.subtotal,
            shipping_cost: summary.shipping,
            total: summary.total,
        }
    }
}

/// Where to send the buyer to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub redirect_url: Url,
    pub order_id: Option<i64>,
}

impl ApiClient {
    /// Create the order and get the payment page URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidResponse` if the answer has no valid
    /// redirect URL, or an error if the request fails.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, total = %request.total))]
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutRedirect, ApiError> {
        let url = self.endpoint("orders/checkout")?;
        let response: CheckoutResponse = self.post_json(url, request).await?;
        let raw = response
            .redirect_url
            .ok_or_else(|| ApiError::InvalidResponse("missing redirectUrl".to_string()))?;
        let redirect_url = Url::parse(&raw)
            .map_err(|e| ApiError::InvalidResponse(format!("invalid redirectUrl: {e}")))?;
        Ok(CheckoutRedirect {
            redirect_url,
            order_id: response.order_id,
        })
    }
}
