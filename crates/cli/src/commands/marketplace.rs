//! Marketplace commands.
//!
//! # Usage
//!
//! ```bash
//! ct-cli marketplace search --text "dracaufeu holo" --price 10-50 --kind vente
//! ct-cli marketplace search --page 2
//! ct-cli marketplace search --kind echange --watch
//! ct-cli --email sacha@bourg-palette.fr marketplace mine
//! ct-cli --email sacha@bourg-palette.fr marketplace withdraw 1001
//! ```

#![allow(clippy::print_stdout)]

use cardtrade_client::Services;
use cardtrade_core::filter::{DEFAULT_PAGE_SIZE, MarketplaceQuery, paginate};
use cardtrade_core::ListingId;
use cardtrade_core::listing::Listing;

use super::{CliError, signed_in};

/// Search listings once, one page at a time.
pub async fn search(services: &Services, query: &MarketplaceQuery, page: u32) -> Result<(), CliError> {
    let listings = services.marketplace_feed().refresh(query).await?;
    let page = paginate(&listings, page, DEFAULT_PAGE_SIZE);

    println!(
        "{} listing(s), page {}/{}",
        listings.len(),
        page.page + 1,
        page.nb_pages
    );
    for listing in &page.items {
        print_listing(listing);
    }
    Ok(())
}

/// Keep polling and print every refresh until Ctrl-C.
pub async fn watch(services: &Services, query: MarketplaceQuery) -> Result<(), CliError> {
    let mut handle = services.marketplace_feed().watch(query);

    loop {
        tokio::select! {
            snapshot = handle.changed() => {
                let Some(snapshot) = snapshot else {
                    break;
                };
                if let Some(error) = &snapshot.last_error {
                    println!(
                        "-- refresh failed ({} in a row): {error}",
                        snapshot.consecutive_failures
                    );
                    continue;
                }
                let at = snapshot
                    .fetched_at
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("-- {} listing(s) at {at}", snapshot.listings.len());
                for listing in &snapshot.listings {
                    print_listing(listing);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop();
    Ok(())
}

/// Listings of the signed-in seller.
pub async fn mine(services: &Services) -> Result<(), CliError> {
    let seller = signed_in(services).await?;
    let listings = services.api().seller_listings(seller).await?;
    println!("{} listing(s)", listings.len());
    for listing in &listings {
        print_listing(listing);
    }
    Ok(())
}

pub async fn withdraw(services: &Services, id: ListingId) -> Result<(), CliError> {
    services.api().delete_listing(id).await?;
    println!("Listing {id} withdrawn.");
    Ok(())
}

fn print_listing(listing: &Listing) {
    let price = listing
        .price
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    let set = listing.card_set.as_deref().unwrap_or("");
    println!(
        "#{:<6} {:<40} {:<12} {:<10} {price}",
        listing.id.to_string(),
        listing.title(),
        set,
        listing.kind.to_string()
    );
}
