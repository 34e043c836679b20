//! Backend HTTP client.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use barker_core::Email;
use barker_core::shipping::ShippingZone;

use super::ApiError;
use super::types::{
    ErrorBody, LoginRequest, LoginResponse, LoginWire, RefreshRequest, RefreshResponse,
    RefreshWire, ZoneListing,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on followed `next` links when listing zones.
const MAX_ZONE_PAGES: usize = 20;

/// Client for the Barker backend REST API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    /// Base URL without a trailing slash, e.g. `https://host/api`.
    base_url: String,
}

impl BackendClient {
    /// Create a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidBaseUrl` if `base_url` does not parse, or
    /// `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Url::parse(base_url)?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// The configured base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    // =========================================================================
    // Shipping zones
    // =========================================================================

    /// Fetch every shipping zone, following pagination links.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails or does not decode.
    #[instrument(skip(self))]
    pub async fn list_shipping_zones(&self) -> Result<Vec<ShippingZone>, ApiError> {
        let mut zones = Vec::new();
        let mut next = Some(self.endpoint("shipping-zones/"));
        let mut pages = 0;

        while let Some(url) = next.take() {
            let listing: ZoneListing = self.get_json(&url).await?;
            pages += 1;

            match listing {
                ZoneListing::Bare(records) => {
                    zones.extend(records.into_iter().map(ShippingZone::from));
                }
                ZoneListing::Page(page) => {
                    zones.extend(page.results.into_iter().map(ShippingZone::from));
                    next = page.next.filter(|n| !n.is_empty());
                }
            }

            if pages >= MAX_ZONE_PAGES && next.is_some() {
                tracing::warn!(pages, "Stopped following shipping zone pages");
                break;
            }
        }

        tracing::debug!(count = zones.len(), "Fetched shipping zones");
        Ok(zones)
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with the backend's message when the
    /// credentials are rejected, or `ApiError::MissingAccessToken` if the
    /// response carries no token.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<LoginResponse, ApiError> {
        let wire: LoginWire = self
            .post_json(
                &self.endpoint("auth/login/"),
                &LoginRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        LoginResponse::try_from(wire)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` if the refresh token is rejected, or
    /// `ApiError::MissingAccessToken` if the response has no `access` field.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshResponse, ApiError> {
        let wire: RefreshWire = self
            .post_json(
                &self.endpoint("auth/token/refresh/"),
                &RefreshRequest {
                    refresh: refresh_token.expose_secret(),
                },
            )
            .await?;

        RefreshResponse::try_from(wire)
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.inner.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.inner.client.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| {
                    if text.trim().is_empty() {
                        status
                            .canonical_reason()
                            .unwrap_or("Unknown error")
                            .to_string()
                    } else {
                        text
                    }
                });
            return Err(ApiError::Status { status, message });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}
