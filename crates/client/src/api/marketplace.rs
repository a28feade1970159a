//! Marketplace listing endpoints.

use tracing::instrument;

use cardtrade_core::filter::MarketplaceQuery;
use cardtrade_core::listing::{Listing, ListingDraft};
use cardtrade_core::{AccountId, ListingId};

use super::conversions::convert_listing;
use super::wire::{ListingRecord, NewListingBody};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// Listings matching `query`.
    ///
    /// An unfiltered query goes to the "all listings" endpoint; anything else
    /// to search with only the parameters that are set.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(query = %query.query_string()))]
    pub async fn search_listings(&self, query: &MarketplaceQuery) -> Result<Vec<Listing>, ApiError> {
        let pairs = query.query_pairs();
        let url = if pairs.is_empty() {
            self.endpoint("marketplace/all")?
        } else {
            self.endpoint_with_query("marketplace/search", &pairs)?
        };
        let records: Option<Vec<ListingRecord>> = self.get_json(url).await?;
        Ok(records
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_listing)
            .collect())
    }

    /// Listings published by one seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn seller_listings(&self, seller: AccountId) -> Result<Vec<Listing>, ApiError> {
        let url = self.endpoint(&format!("marketplace/user/{seller}"))?;
        let records: Option<Vec<ListingRecord>> = self.get_json(url).await?;
        Ok(records
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_listing)
            .collect())
    }

    /// Publish a listing for `seller`.
    ///
    /// The draft is expected to be validated; only sales carry a price.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the backend refuses the listing,
    /// or an error if the request fails.
    #[instrument(skip(self, draft), fields(card_id = %draft.card_id, kind = %draft.kind))]
    pub async fn publish_listing(
        &self,
        seller: AccountId,
        draft: &ListingDraft,
    ) -> Result<(), ApiError> {
        let body = NewListingBody {
            user_id: seller,
            cards_id: draft.card_id,
            details: (&draft.details).into(),
            photo: draft.photo.as_deref(),
            kind: draft.kind.wire_value().unwrap_or_default(),
            prix: draft.asking_price(),
        };
        self.post_checked(self.endpoint("marketplace/add")?, &body, "publish listing")
            .await
    }

    /// Withdraw a listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_listing(&self, id: ListingId) -> Result<(), ApiError> {
        self.delete_unit(self.endpoint(&format!("marketplace/{id}"))?)
            .await
    }
}
