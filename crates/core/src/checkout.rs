//! Checkout shipping quote and order summary.
//!
//! The checkout form re-quotes shipping whenever the postal code grows past
//! [`QUOTE_MIN_POSTAL_CODE_LEN`] characters or the customer switches delivery
//! method. Failures never block the form: the quote falls back to zero and
//! carries a notice for the UI to show.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::shipping::{ShippingError, ShippingZone, find_zone};

/// Postal codes shorter than this are still being typed.
pub const QUOTE_MIN_POSTAL_CODE_LEN: usize = 4;

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Customer collects at the store; no shipping charge.
    Pickup,
    #[default]
    HomeDelivery,
}

/// Result of quoting shipping for the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    /// Zero whenever `notice` is set.
    pub price: Decimal,
    pub estimated_days: Option<u32>,
    /// Failure to surface as a toast.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<ShippingError>,
}

impl ShippingQuote {
    const fn free() -> Self {
        Self {
            price: Decimal::ZERO,
            estimated_days: None,
            notice: None,
        }
    }

    const fn failed(notice: ShippingError) -> Self {
        Self {
            price: Decimal::ZERO,
            estimated_days: None,
            notice: Some(notice),
        }
    }
}

/// Whether a partially typed postal code is long enough to quote.
#[must_use]
pub fn should_quote(postal_code: &str) -> bool {
    postal_code.trim().chars().count() >= QUOTE_MIN_POSTAL_CODE_LEN
}

/// Quote shipping for the checkout form.
#[must_use]
pub fn quote_shipping(
    postal_code: &str,
    method: DeliveryMethod,
    zones: &[ShippingZone],
) -> ShippingQuote {
    if method == DeliveryMethod::Pickup {
        return ShippingQuote::free();
    }

    match find_zone(postal_code, zones) {
        Ok(zone) => ShippingQuote {
            price: zone.shipping_price,
            estimated_days: (zone.estimated_days > 0).then_some(zone.estimated_days),
            notice: None,
        },
        Err(err) => ShippingQuote::failed(err),
    }
}

/// Amounts shown next to the pay button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl CheckoutSummary {
    #[must_use]
    pub fn new(cart: &Cart, quote: &ShippingQuote) -> Self {
        let subtotal = cart.total_price();
        Self {
            subtotal,
            shipping: quote.price,
            total: subtotal + quote.price,
        }
    }
}
