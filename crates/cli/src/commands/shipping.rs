//! Shipping commands.

#![allow(clippy::print_stdout)]

use cardtrade_client::Services;
use cardtrade_core::shipping::{PostalCode, ShippingMethod, ShippingOption};

use super::CliError;

/// Shipping options on offer.
pub async fn options(services: &Services) -> Result<(), CliError> {
    for option in services.api().shipping_options().await? {
        print_option(&option, false);
    }
    Ok(())
}

/// Relay points around a postal code.
pub async fn relay(services: &Services, postal_code: &str) -> Result<(), CliError> {
    let postal_code =
        PostalCode::parse(postal_code).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    let points = services.api().relay_points(&postal_code).await?;
    if points.is_empty() {
        println!("No relay point near {postal_code}.");
    }
    for point in &points {
        print_option(point, false);
    }
    Ok(())
}

pub fn print_option(option: &ShippingOption, selected: bool) {
    let marker = if selected { "*" } else { " " };
    let kind = match &option.method {
        ShippingMethod::Flat { carrier } => carrier.clone(),
        ShippingMethod::RelayCategory => "relay (search a point)".to_string(),
        ShippingMethod::RelayPoint { postal_code } => format!("relay point {postal_code}"),
    };
    println!(
        "{marker} {:<12} {:<36} {:>10}  {kind}",
        option.id, option.name, option.price.to_string()
    );
    if let Some(description) = &option.description {
        println!("    {description}");
    }
}
