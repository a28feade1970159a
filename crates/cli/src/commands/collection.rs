//! Collection, category and saved-card commands.
//!
//! # Usage
//!
//! ```bash
//! ct-cli --email sacha@bourg-palette.fr collection list
//! ct-cli --email sacha@bourg-palette.fr collection category 1 --search "base holo"
//! ct-cli --email sacha@bourg-palette.fr collection import 1 cartes.txt
//! ct-cli --email sacha@bourg-palette.fr collection sell 150 --kind vente --price 25
//! ```

#![allow(clippy::print_stdout)]

use std::path::Path;

use cardtrade_client::Services;
use cardtrade_client::collection::{NewCard, Transfer};
use cardtrade_core::collection::CollectionCard;
use cardtrade_core::filter::{ListingKind, TextFilter};
use cardtrade_core::listing::CardDetails;
use cardtrade_core::{CardId, CategoryId, Price, SavedCardId};

use super::{CliError, signed_in};

/// Owned cards, optionally filtered by free text.
pub async fn list(services: &Services, search: &str) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    let cards = services.api().collection(user).await?;
    let shown = TextFilter::new(search).apply(&cards);
    println!("{} card(s)", shown.len());
    for card in shown {
        print_card(card);
    }
    Ok(())
}

pub async fn categories(services: &Services) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    for category in services.api().categories(user).await? {
        println!(
            "{:<6} {} ({} card(s))",
            category.id, category.name, category.card_count
        );
    }
    Ok(())
}

/// Cards of one category.
pub async fn category(
    services: &Services,
    category: CategoryId,
    search: &str,
) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    let cards = services
        .collection()
        .category_view(user, category, search)
        .await?;
    println!("{} card(s)", cards.len());
    for card in &cards {
        print_card(card);
    }
    Ok(())
}

pub async fn new_category(services: &Services, name: &str) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    services.collection().create_category(user, name).await?;
    println!("Category created.");
    Ok(())
}

pub async fn delete_category(services: &Services, category: CategoryId) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    services.api().delete_category(user, category).await?;
    println!("Category deleted.");
    Ok(())
}

/// Add the card identifiers of a text file (one per line) to a category.
pub async fn import(
    services: &Services,
    category: CategoryId,
    file: &Path,
) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    let text = std::fs::read_to_string(file)
        .map_err(|e| CliError::InvalidArgument(format!("{}: {e}", file.display())))?;
    let added = services
        .collection()
        .import_into_category(user, category, &text)
        .await?;
    println!("{added} card(s) added.");
    Ok(())
}

/// Store a card and optionally list it.
pub async fn add(services: &Services, card: NewCard) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    let id = services.collection().add_card(user, &card).await?;
    if card.kind == ListingKind::All {
        println!("Card {id} stored.");
    } else {
        println!("Card {id} stored and listed ({}).", card.kind);
    }
    Ok(())
}

/// Move an owned card to the marketplace.
pub async fn sell(
    services: &Services,
    card: CardId,
    kind: ListingKind,
    price: Option<Price>,
) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    let owned = services
        .api()
        .collection(user)
        .await?
        .into_iter()
        .find(|c| c.id == card)
        .ok_or_else(|| {
            CliError::InvalidArgument(format!("card {card} is not in your collection"))
        })?;

    match services
        .collection()
        .transfer_to_marketplace(user, &owned, kind, price)
        .await?
    {
        Transfer::Moved => println!("Listed ({kind})."),
        Transfer::ListedOnly => {
            println!("Listed ({kind}), but the card is still in your collection.");
        }
    }
    Ok(())
}

pub async fn saved(services: &Services) -> Result<(), CliError> {
    let user = signed_in(services).await?;
    for card in services.api().saved_cards(user).await? {
        println!("{:<6} {}", card.id, describe(&card.details));
    }
    Ok(())
}

pub async fn unsave(services: &Services, id: SavedCardId) -> Result<(), CliError> {
    services.api().delete_saved_card(id).await?;
    println!("Removed.");
    Ok(())
}

fn print_card(card: &CollectionCard) {
    println!("{:<6} {}", card.id, describe(&card.details));
}

fn describe(details: &CardDetails) -> String {
    let year = details.year.map(|y| format!(" ({y})")).unwrap_or_default();
    let set = details.card_set.as_deref().unwrap_or("-");
    let number = details.number.as_deref().unwrap_or("-");
    let attributes = details
        .attributes
        .as_deref()
        .map(|a| format!("  [{a}]"))
        .unwrap_or_default();
    format!("{}{year}  {set} #{number}{attributes}", details.name)
}
