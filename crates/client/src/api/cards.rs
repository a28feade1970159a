//! Card catalogue endpoints.

use tracing::instrument;

use cardtrade_core::collection::CollectionCard;
use cardtrade_core::filter::{CardSearchQuery, Page};
use cardtrade_core::listing::{Card, CardDetails};
use cardtrade_core::{AccountId, CardId};

use super::conversions::{convert_card, convert_collection_card};
use super::wire::{
    CardDetailsBody, CardSearchResponse, CollectionCardRecord, ExistsResponse, IdRecord,
    NewCardBody, RandomCardsResponse,
};
use super::{ApiClient, ApiError};

/// One page of catalogue search results.
pub type CardPage = Page<Card>;

impl ApiClient {
    /// Search the card catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(text = %query.text, page = query.page))]
    pub async fn search_cards(&self, query: &CardSearchQuery) -> Result<CardPage, ApiError> {
        let url = self.endpoint_with_query("cards/search", &query.query_pairs())?;
        let response: CardSearchResponse = self.get_json(url).await?;
        Ok(Page {
            items: response
                .results
                .into_iter()
                .filter_map(convert_card)
                .collect(),
            page: query.page,
            nb_pages: response
                .nb_pages
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(1)
                .max(1),
        })
    }

    /// A random selection of cards for discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn random_cards(&self, limit: u32) -> Result<Vec<Card>, ApiError> {
        let url = self.endpoint_with_query("cards/random", &[("limit", limit.to_string())])?;
        let response: RandomCardsResponse = self.get_json(url).await?;
        Ok(response
            .cards
            .or(response.results)
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_card)
            .collect())
    }

    /// Id of the stored card with exactly these details, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, details), fields(name = %details.name))]
    pub async fn find_card(&self, details: &CardDetails) -> Result<Option<CardId>, ApiError> {
        let body = CardDetailsBody::from(details);
        let response: Option<ExistsResponse> =
            self.post_json(self.endpoint("cards/exists")?, &body).await?;
        Ok(response
            .filter(|r| r.exists)
            .and_then(|r| r.card)
            .and_then(|card| card.id)
            .map(CardId::new))
    }

    /// Store a new card created by `owner` and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidResponse`] when the answer has no id, or
    /// an error if the request fails.
    #[instrument(skip(self, details, photo), fields(name = %details.name))]
    pub async fn create_card(
        &self,
        owner: AccountId,
        details: &CardDetails,
        photo: Option<&str>,
    ) -> Result<CardId, ApiError> {
        let body = NewCardBody {
            details: details.into(),
            owner,
            photo,
        };
        let response: Option<IdRecord> = self.post_json(self.endpoint("cards/add")?, &body).await?;
        response
            .and_then(|r| r.id)
            .map(CardId::new)
            .ok_or_else(|| ApiError::InvalidResponse("created card has no id".to_string()))
    }

    /// Id of the card with these details, storing it first when unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails.
    pub async fn find_or_create_card(
        &self,
        owner: AccountId,
        details: &CardDetails,
        photo: Option<&str>,
    ) -> Result<CardId, ApiError> {
        match self.find_card(details).await? {
            Some(id) => Ok(id),
            None => self.create_card(owner, details, photo).await,
        }
    }

    /// A stored card by id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown cards, or an error if the
    /// request fails.
    #[instrument(skip(self))]
    pub async fn get_card(&self, id: CardId) -> Result<CollectionCard, ApiError> {
        let record: Option<CollectionCardRecord> =
            self.get_json(self.endpoint(&format!("cards/{id}"))?).await?;
        record
            .and_then(convert_collection_card)
            .ok_or_else(|| ApiError::NotFound(format!("card {id}")))
    }
}
