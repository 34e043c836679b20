//! Checkout shipping quote.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use barker_core::Price;
use barker_core::checkout::{DeliveryMethod, QUOTE_MIN_POSTAL_CODE_LEN, should_quote};
use barker_core::shipping::ShippingError;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Quote request from the checkout form.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub postal_code: String,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
}

/// Why the quote fell back to zero, for the toast.
#[derive(Debug, Serialize)]
pub struct QuoteNotice {
    pub kind: &'static str,
    pub message: String,
    pub postal_code: String,
}

impl From<&ShippingError> for QuoteNotice {
    fn from(err: &ShippingError) -> Self {
        let kind = match err {
            ShippingError::InvalidPostalCode(_) => "invalid_postal_code",
            ShippingError::NoZoneFound(_) => "no_zone_found",
        };
        Self {
            kind,
            message: err.to_string(),
            postal_code: err.postal_code().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub shipping_price: Decimal,
    /// Price formatted for the order summary, e.g. `$ 2.500,00`.
    pub shipping_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<QuoteNotice>,
}

/// `POST /api/shipping/quote`
///
/// Unknown or malformed codes still answer `200` with a zero price and a
/// notice; only a backend outage is an error.
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>> {
    if request.delivery_method == DeliveryMethod::HomeDelivery
        && !should_quote(&request.postal_code)
    {
        return Err(AppError::BadRequest(format!(
            "El código postal debe tener al menos {QUOTE_MIN_POSTAL_CODE_LEN} caracteres"
        )));
    }

    let quote = state
        .zones()
        .quote(&request.postal_code, request.delivery_method)
        .await?;

    Ok(Json(QuoteResponse {
        shipping_price: quote.price,
        shipping_label: Price::ars(quote.price).to_string(),
        estimated_days: quote.estimated_days,
        notice: quote.notice.as_ref().map(QuoteNotice::from),
    }))
}
