//! Checkout commands.
//!
//! # Usage
//!
//! ```bash
//! # Quote two listings with Colissimo
//! ct-cli --email me@exemple.fr checkout quote -l 12 -l 13 -s colissimo
//!
//! # Relay delivery: pick the relay category, search points, place the order
//! ct-cli --email me@exemple.fr checkout quote -l 12 -s relay -p 69002 --submit
//! ```

#![allow(clippy::print_stdout)]

use chrono::Utc;

use cardtrade_client::Services;
use cardtrade_core::cart::Cart;
use cardtrade_core::checkout::Checkout;
use cardtrade_core::filter::MarketplaceQuery;
use cardtrade_core::{CartItemId, ListingId};

use super::CliError;
use super::shipping::print_option;

/// Options for `checkout quote`.
#[derive(Debug, Default)]
pub struct QuoteOptions {
    pub listings: Vec<ListingId>,
    pub shipping_option: Option<String>,
    pub postal_code: Option<String>,
    pub submit: bool,
}

/// Build a cart from listing ids, price it, and optionally place the order.
pub async fn quote(services: &Services, options: QuoteOptions) -> Result<(), CliError> {
    let cart = build_cart(services, &options.listings).await?;
    let mut session = services.checkout(cart).await?;

    if let Some(id) = &options.shipping_option {
        session.checkout_mut().select_option(id)?;
    }
    if let Some(postal_code) = options.postal_code {
        session.checkout_mut().set_postal_code(postal_code);
        let found = session.search_relay_points().await?;
        println!("{found} relay point(s) found");
    }

    print_quote(session.checkout());

    if options.submit {
        let redirect = session.submit().await?;
        println!();
        println!("Pay at: {}", redirect.redirect_url);
    } else if let Err(blocker) = session.checkout().readiness() {
        println!();
        println!("Cannot check out yet: {blocker}");
    }
    Ok(())
}

async fn build_cart(services: &Services, ids: &[ListingId]) -> Result<Cart, CliError> {
    let listings = services
        .api()
        .search_listings(&MarketplaceQuery::default())
        .await?;
    let now = Utc::now();

    let mut cart = Cart::new();
    for (n, id) in (1..).zip(ids) {
        let listing = listings
            .iter()
            .find(|l| l.id == *id)
            .ok_or_else(|| CliError::InvalidArgument(format!("listing {id} not found")))?;
        let line = listing
            .to_cart_line(CartItemId::new(n), now)
            .ok_or_else(|| CliError::InvalidArgument(format!("listing {id} is not for sale")))?;
        cart.add(line)?;
    }
    Ok(cart)
}

fn print_quote(checkout: &Checkout) {
    println!("Cart:");
    for item in checkout.cart().items() {
        println!("  {:<40} {:>10}", item.title, item.unit_price.to_string());
    }

    println!("Shipping:");
    let selected = checkout.selected_option().map(|o| o.id.clone());
    for option in checkout.displayed_options() {
        print_option(option, selected.as_deref() == Some(option.id.as_str()));
    }

    println!();
    println!("Subtotal: {}", checkout.subtotal());
    println!("Shipping: {}", checkout.shipping_cost());
    println!("Total:    {}", checkout.total());
    if let Ok(summary) = checkout.summary() {
        println!();
        println!("{}", summary.confirmation_text());
    }
}
