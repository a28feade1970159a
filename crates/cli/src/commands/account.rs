//! Account commands.
//!
//! # Usage
//!
//! ```bash
//! ct-cli --email sacha@bourg-palette.fr account resolve
//! ct-cli --email sacha@bourg-palette.fr account update --pseudo "Sacha K"
//! ```

#![allow(clippy::print_stdout)]

use cardtrade_client::Services;
use cardtrade_client::api::ProfileUpdate;
use cardtrade_core::conversation::DEFAULT_PSEUDONYM;

use super::{CliError, signed_in};

/// Resolve the account id of the signed-in email and show the profile.
pub async fn resolve(services: &Services) -> Result<(), CliError> {
    let id = signed_in(services).await?;
    let profile = services.api().get_profile(id).await?;

    println!("Account id: {id}");
    println!("Pseudo:     {}", profile.display_name(DEFAULT_PSEUDONYM));
    let delivery = &profile.delivery;
    println!("Name:       {}", delivery.full_name());
    let missing = delivery.missing_fields();
    if missing.is_empty() {
        println!(
            "Address:    {}, {} {}, {}",
            delivery.address, delivery.postal_code, delivery.city, delivery.country
        );
    } else {
        let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
        println!("Address:    incomplete (missing: {})", missing.join(", "));
    }
    Ok(())
}

/// Profile fields to change; `None` keeps the current value.
#[derive(Debug, Default)]
pub struct ProfileEdits {
    pub pseudo: Option<String>,
    pub address: Option<String>,
    pub paypal: Option<String>,
}

/// Apply edits on top of the current profile.
pub async fn update(services: &Services, edits: ProfileEdits) -> Result<(), CliError> {
    let id = signed_in(services).await?;
    let current = services.api().get_profile(id).await?;
    let mut update = ProfileUpdate::from(&current);
    if let Some(pseudo) = edits.pseudo {
        update.pseudo = pseudo;
    }
    if let Some(address) = edits.address {
        update.address = address;
    }
    if let Some(paypal) = edits.paypal {
        update.paypal = paypal;
    }
    services.api().update_profile(id, &update).await?;
    println!("Profile updated.");
    Ok(())
}
