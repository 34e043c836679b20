//! Shipping quotes from the command line.
//!
//! Uses the same resolution as the checkout form, so a quote here matches
//! what a customer sees for the same zones.

use std::path::Path;

use barker_core::Price;
use barker_core::checkout::{DeliveryMethod, ShippingQuote, quote_shipping, should_quote};
use barker_core::shipping::ShippingZone;
use barker_storefront::api::{ApiError, BackendClient, parse_zone_export};
use thiserror::Error;

/// Errors that can occur while quoting.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Zones file could not be read.
    #[error("Failed to read zones file: {0}")]
    Io(#[from] std::io::Error),

    /// Zones file is not a zone listing.
    #[error("Zones file is not a shipping-zones response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),
}

/// Quote shipping for `postal_code` and print the result.
pub async fn run(
    api: &str,
    postal_code: &str,
    zones_file: Option<&Path>,
    pickup: bool,
) -> Result<(), QuoteError> {
    let method = if pickup {
        DeliveryMethod::Pickup
    } else {
        DeliveryMethod::HomeDelivery
    };

    let quote = quote(api, postal_code, zones_file, method).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Shipping: {}", Price::ars(quote.price));
        if let Some(days) = quote.estimated_days {
            println!("Estimated delivery: {days} days");
        }
        if let Some(notice) = &quote.notice {
            println!("Notice: {notice}");
        }
    }

    Ok(())
}

/// Quote without printing. Pickup is free and never loads zones.
async fn quote(
    api: &str,
    postal_code: &str,
    zones_file: Option<&Path>,
    method: DeliveryMethod,
) -> Result<ShippingQuote, QuoteError> {
    if method == DeliveryMethod::Pickup {
        return Ok(quote_shipping(postal_code, method, &[]));
    }

    if !should_quote(postal_code) {
        tracing::warn!("Postal code is shorter than checkout would quote");
    }

    let zones = load_zones(api, zones_file).await?;
    tracing::info!(count = zones.len(), "Loaded shipping zones");

    Ok(quote_shipping(postal_code, method, &zones))
}

async fn load_zones(api: &str, zones_file: Option<&Path>) -> Result<Vec<ShippingZone>, QuoteError> {
    if let Some(path) = zones_file {
        let json = std::fs::read_to_string(path)?;
        return Ok(parse_zone_export(&json)?);
    }

    tracing::info!("Fetching shipping zones from {api}");
    let client = BackendClient::new(api)?;
    Ok(client.list_shipping_zones().await?)
}
