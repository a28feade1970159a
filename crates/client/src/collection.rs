//! Collection flows spanning several backend calls.

use tracing::{info, instrument, warn};

use cardtrade_core::collection::{
    CollectionCard, category_cards, category_name, parse_card_identifiers,
};
use cardtrade_core::filter::ListingKind;
use cardtrade_core::listing::{CardDetails, ListingDraft, check_offer};
use cardtrade_core::{AccountId, CardId, CategoryId, Price};

use crate::api::ApiClient;
use crate::error::{ClientError, add_breadcrumb};

/// A card typed in by its owner, optionally offered right away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCard {
    pub details: CardDetails,
    pub photo: Option<String>,
    /// `All` keeps the card off the marketplace.
    pub kind: ListingKind,
    pub price: Option<Price>,
}

/// Result of moving a collection card to the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Listed and removed from the collection.
    Moved,
    /// Listed, but still in the collection.
    ListedOnly,
}

/// Collection, category and card-creation flows for one backend.
#[derive(Debug, Clone)]
pub struct CollectionService {
    api: ApiClient,
}

impl CollectionService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Cards of one category matching `search`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the collection or its links fails.
    #[instrument(skip(self))]
    pub async fn category_view(
        &self,
        user: AccountId,
        category: CategoryId,
        search: &str,
    ) -> Result<Vec<CollectionCard>, ClientError> {
        let (cards, links) =
            tokio::try_join!(self.api.collection(user), self.api.category_links(user))?;
        Ok(category_cards(&cards, &links, category, search)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Store a card, reusing the catalogue entry with the same details, and
    /// publish it when a listing kind is chosen.
    ///
    /// Everything is validated before the first request.
    ///
    /// # Errors
    ///
    /// Returns the draft error for missing fields or a sale without price,
    /// or an error if a request fails.
    #[instrument(skip(self, card), fields(name = %card.details.name, kind = %card.kind))]
    pub async fn add_card(&self, owner: AccountId, card: &NewCard) -> Result<CardId, ClientError> {
        card.details.validate()?;
        let listing = (card.kind != ListingKind::All).then_some(card.kind);
        if let Some(kind) = listing {
            check_offer(kind, card.price)?;
        }

        let card_id = self
            .api
            .find_or_create_card(owner, &card.details, card.photo.as_deref())
            .await?;

        if let Some(kind) = listing {
            let draft = draft(card_id, &card.details, card.photo.as_deref(), kind, card.price);
            self.api.publish_listing(owner, &draft).await?;
            info!(card_id = %card_id, "Card listed");
        }
        Ok(card_id)
    }

    /// List a collection card on the marketplace, then remove it from the
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns the draft error when the kind or price is invalid, or an error
    /// if publishing fails. A failed removal after publishing is reported
    /// as [`Transfer::ListedOnly`].
    #[instrument(skip(self, card), fields(card_id = %card.id))]
    pub async fn transfer_to_marketplace(
        &self,
        seller: AccountId,
        card: &CollectionCard,
        kind: ListingKind,
        price: Option<Price>,
    ) -> Result<Transfer, ClientError> {
        let draft = draft(card.id, &card.details, card.photo.as_deref(), kind, price);
        draft.validate()?;
        self.api.publish_listing(seller, &draft).await?;
        add_breadcrumb(
            "collection",
            "Card moved to marketplace",
            Some(&[("kind", kind.wire_value().unwrap_or_default())]),
        );

        match self.api.remove_from_collection(seller, card.id).await {
            Ok(()) => Ok(Transfer::Moved),
            Err(e) => {
                warn!(error = %e, "Listed card could not be removed from the collection");
                Ok(Transfer::ListedOnly)
            }
        }
    }

    /// Create a category with a trimmed, non-empty name.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::EmptyCategoryName` for a blank name, or an
    /// error if the request fails.
    pub async fn create_category(&self, user: AccountId, name: &str) -> Result<(), ClientError> {
        let name = category_name(name)?;
        self.api.create_category(user, name).await?;
        Ok(())
    }

    /// Add the cards listed in an import file (one identifier per line) to a
    /// category. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::EmptyImport` when the file names no card,
    /// or an error if the request fails.
    #[instrument(skip(self, file))]
    pub async fn import_into_category(
        &self,
        user: AccountId,
        category: CategoryId,
        file: &str,
    ) -> Result<u32, ClientError> {
        let identifiers = parse_card_identifiers(file)?;
        let added = self
            .api
            .bulk_add_cards(user, category, &identifiers)
            .await?;
        info!(requested = identifiers.len(), added, "Cards imported");
        Ok(added)
    }
}

fn draft(
    card_id: CardId,
    details: &CardDetails,
    photo: Option<&str>,
    kind: ListingKind,
    price: Option<Price>,
) -> ListingDraft {
    ListingDraft {
        card_id,
        details: details.clone(),
        photo: photo.map(str::to_owned),
        kind,
        price,
    }
}
