//! Collection, category and saved-card endpoints.

use tracing::{debug, instrument};

use cardtrade_core::collection::{Category, CategoryLink, CollectionCard, SavedCard};
use cardtrade_core::listing::CardDetails;
use cardtrade_core::{AccountId, CardId, CategoryId, SavedCardId};

use super::conversions::{
    convert_category, convert_category_link, convert_collection_card, convert_saved_card,
};
use super::wire::{
    BulkAddBody, CategoryBody, CategoryLinkRecord, CategoryRecord, CollectionCheckBody,
    CollectionEntryBody, CollectionRemoveBody, CollectionResponse, CountResponse, ExistsResponse,
    SaveCardBody, SavedCardsResponse,
};
use super::{ApiClient, ApiError};

impl ApiClient {
    // =========================================================================
    // Collection
    // =========================================================================

    /// Every card owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn collection(&self, user: AccountId) -> Result<Vec<CollectionCard>, ApiError> {
        let url = self.endpoint(&format!("users/{user}/collection"))?;
        let response: Option<CollectionResponse> = self.get_json(url).await?;
        Ok(response
            .unwrap_or_default()
            .collection
            .into_iter()
            .filter_map(convert_collection_card)
            .collect())
    }

    /// Whether `user` already owns this card.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, details))]
    pub async fn in_collection(
        &self,
        user: AccountId,
        card: CardId,
        details: &CardDetails,
    ) -> Result<bool, ApiError> {
        let body = CollectionCheckBody {
            user_id: user,
            cards_id: card,
            details: details.into(),
        };
        let response: Option<ExistsResponse> = self
            .post_json(self.endpoint("cards/check-in-collection")?, &body)
            .await?;
        Ok(response.is_some_and(|r| r.exists))
    }

    /// Add a card to `user`'s collection, optionally straight into a
    /// category.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the backend refuses (for example
    /// a card already owned), or an error if the request fails.
    #[instrument(skip(self, card), fields(card_id = %card.id))]
    pub async fn add_to_collection(
        &self,
        user: AccountId,
        card: &CollectionCard,
        category: Option<CategoryId>,
    ) -> Result<(), ApiError> {
        let body = CollectionEntryBody {
            user_id: user,
            cards_id: card.id,
            details: (&card.details).into(),
            photo: card.photo.as_deref(),
            category_id: category,
        };
        self.post_checked(
            self.endpoint("cards/add-to-collection")?,
            &body,
            "add to collection",
        )
        .await
    }

    /// Remove a card from `user`'s collection.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the backend refuses, or an error
    /// if the request fails.
    #[instrument(skip(self))]
    pub async fn remove_from_collection(
        &self,
        user: AccountId,
        card: CardId,
    ) -> Result<(), ApiError> {
        let body = CollectionRemoveBody {
            user_id: user,
            cards_id: card,
        };
        self.post_checked(self.endpoint("cards/delete")?, &body, "remove from collection")
            .await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Categories of `user` with their card counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self, user: AccountId) -> Result<Vec<Category>, ApiError> {
        let url = self.endpoint(&format!("users/{user}/categories"))?;
        let records: Option<Vec<CategoryRecord>> = self.get_json(url).await?;
        Ok(records
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_category)
            .collect())
    }

    /// Create a category. `name` is sent as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn create_category(&self, user: AccountId, name: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("users/{user}/categories"))?;
        self.post_unit(url, &CategoryBody { name }).await
    }

    /// Delete a category; its cards stay in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_category(
        &self,
        user: AccountId,
        category: CategoryId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("users/{user}/categories/{category}"))?;
        self.delete_unit(url).await
    }

    /// Every (category, card) link of `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn category_links(&self, user: AccountId) -> Result<Vec<CategoryLink>, ApiError> {
        let url = self.endpoint(&format!("users/{user}/card-categories"))?;
        let records: Option<Vec<CategoryLinkRecord>> = self.get_json(url).await?;
        let records = records.unwrap_or_default();
        let links: Vec<CategoryLink> = records.iter().filter_map(convert_category_link).collect();
        if links.len() < records.len() {
            debug!(dropped = records.len() - links.len(), "Skipping incomplete category links");
        }
        Ok(links)
    }

    /// Take a card out of a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn remove_card_from_category(
        &self,
        user: AccountId,
        category: CategoryId,
        card: CardId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&format!(
            "users/{user}/categories/{category}/remove-card/{card}"
        ))?;
        self.delete_unit(url).await
    }

    /// Add catalogue cards to a category by identifier; returns how many the
    /// backend added.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, identifiers), fields(identifiers = identifiers.len()))]
    pub async fn bulk_add_cards(
        &self,
        user: AccountId,
        category: CategoryId,
        identifiers: &[String],
    ) -> Result<u32, ApiError> {
        let url = self.endpoint(&format!(
            "users/{user}/categories/{category}/bulk-add-cards"
        ))?;
        let body = BulkAddBody {
            card_identifiers: identifiers,
        };
        let response: Option<CountResponse> = self.post_json(url, &body).await?;
        Ok(response
            .and_then(|r| r.count)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0))
    }

    // =========================================================================
    // Saved cards
    // =========================================================================

    /// Cards bookmarked by `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn saved_cards(&self, user: AccountId) -> Result<Vec<SavedCard>, ApiError> {
        let url = self.endpoint(&format!("cards/saved-cards/{user}"))?;
        let response: Option<SavedCardsResponse> = self.get_json(url).await?;
        Ok(response
            .map(SavedCardsResponse::into_records)
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_saved_card)
            .collect())
    }

    /// Bookmark a card.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the backend refuses, or an error
    /// if the request fails.
    #[instrument(skip(self, details))]
    pub async fn save_card(
        &self,
        user: AccountId,
        card: CardId,
        details: &CardDetails,
    ) -> Result<(), ApiError> {
        let body = SaveCardBody {
            user_id: user,
            card_id: card,
            details: details.into(),
        };
        self.post_checked(self.endpoint("cards/saved-cards")?, &body, "save card")
            .await
    }

    /// Drop a bookmark.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_saved_card(&self, id: SavedCardId) -> Result<(), ApiError> {
        self.delete_unit(self.endpoint(&format!("cards/saved-cards/{id}"))?)
            .await
    }
}
