//! Shipping zones with a short-lived cache.
//!
//! Zones change only when an admin edits them, so the list fetched from the
//! backend is reused for the configured TTL (5 minutes by default).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use barker_core::checkout::{DeliveryMethod, ShippingQuote, quote_shipping};
use barker_core::shipping::ShippingZone;

use crate::api::{ApiError, BackendClient};

const ZONES_KEY: &str = "shipping-zones";

/// Shipping quotes backed by the backend's zone list.
#[derive(Clone)]
pub struct ZoneService {
    inner: Arc<ZoneServiceInner>,
}

struct ZoneServiceInner {
    client: BackendClient,
    /// `None` when caching is disabled (zero TTL).
    cache: Option<Cache<&'static str, Arc<Vec<ShippingZone>>>>,
}

impl ZoneService {
    #[must_use]
    pub fn new(client: BackendClient, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| Cache::builder().max_capacity(1).time_to_live(ttl).build());

        Self {
            inner: Arc::new(ZoneServiceInner { client, cache }),
        }
    }

    /// Every zone, in backend order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the zones are not cached and the backend call
    /// fails.
    #[instrument(skip(self))]
    pub async fn zones(&self) -> Result<Arc<Vec<ShippingZone>>, ApiError> {
        if let Some(cache) = &self.inner.cache
            && let Some(zones) = cache.get(ZONES_KEY).await
        {
            debug!("Cache hit for shipping zones");
            return Ok(zones);
        }

        let zones = Arc::new(self.inner.client.list_shipping_zones().await?);

        if let Some(cache) = &self.inner.cache {
            cache.insert(ZONES_KEY, Arc::clone(&zones)).await;
        }
        Ok(zones)
    }

    /// Quote shipping for a postal code.
    ///
    /// Pickup is free and never loads zones.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` only when zones cannot be loaded. Unknown or
    /// malformed postal codes are reported through the quote's notice.
    #[instrument(skip(self), fields(postal_code = %postal_code))]
    pub async fn quote(
        &self,
        postal_code: &str,
        method: DeliveryMethod,
    ) -> Result<ShippingQuote, ApiError> {
        if method == DeliveryMethod::Pickup {
            return Ok(quote_shipping(postal_code, method, &[]));
        }

        let zones = self.zones().await?;
        let quote = quote_shipping(postal_code, method, &zones);
        if let Some(notice) = &quote.notice {
            debug!(%notice, "No shipping price for postal code");
        }
        Ok(quote)
    }
}

impl std::fmt::Debug for ZoneService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneService")
            .field("client", &self.inner.client)
            .field("cached", &self.inner.cache.is_some())
            .finish()
    }
}
