//! Card catalogue commands.

#![allow(clippy::print_stdout)]

use cardtrade_client::Services;
use cardtrade_core::filter::CardSearchQuery;
use cardtrade_core::listing::Card;

use super::CliError;

/// Search the catalogue; `page` is zero-based.
pub async fn search(services: &Services, text: &str, page: u32) -> Result<(), CliError> {
    let result = services
        .api()
        .search_cards(&CardSearchQuery::new(text, page))
        .await?;

    println!("Page {}/{}", result.page + 1, result.nb_pages);
    for card in &result.items {
        print_card(card);
    }
    Ok(())
}

pub async fn random(services: &Services, limit: u32) -> Result<(), CliError> {
    for card in services.api().random_cards(limit).await? {
        print_card(&card);
    }
    Ok(())
}

fn print_card(card: &Card) {
    let year = card.year.map(|y| format!(" ({y})")).unwrap_or_default();
    let set = card.card_set.as_deref().unwrap_or("-");
    let number = card.number.as_deref().unwrap_or("-");
    println!("{:<12} {}{year}  {set} #{number}", card.id, card.name);
}
