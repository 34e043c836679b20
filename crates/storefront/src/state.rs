//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiError, BackendClient};
use crate::config::StorefrontConfig;
use crate::middleware::RouteGuard;
use crate::services::ZoneService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds no per-user session data: sessions
/// live in the browser and reach the server only as cookies.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    zones: ZoneService,
    guard: Arc<RouteGuard>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend base URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let backend = BackendClient::new(&config.api_base)?;
        let zones = ZoneService::new(backend.clone(), config.zone_cache_ttl);
        let guard = Arc::new(RouteGuard::new(config.guard.clone()));

        Ok(Self::from_parts(config, backend, zones, guard))
    }

    /// Assemble state from prebuilt parts.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        backend: BackendClient,
        zones: ZoneService,
        guard: Arc<RouteGuard>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                zones,
                guard,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the shipping zone service.
    #[must_use]
    pub fn zones(&self) -> &ZoneService {
        &self.inner.zones
    }

    /// Get a handle to the route guard.
    #[must_use]
    pub fn guard(&self) -> Arc<RouteGuard> {
        Arc::clone(&self.inner.guard)
    }
}
