//! Barker backend REST client.
//!
//! The backend owns products, orders, payments and shipping zones. The
//! storefront only needs three of its endpoints:
//!
//! - `GET  /shipping-zones/` - zone list for checkout quotes
//! - `POST /auth/login/` - email/password login
//! - `POST /auth/token/refresh/` - exchange a refresh token for a new access token
//!
//! Wire payloads are snake_case and are mapped to `barker_core` types at this
//! boundary.

pub mod client;
pub mod types;

pub use client::BackendClient;
pub use types::{LoginResponse, RefreshResponse, UserProfile, parse_zone_export};

use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL is not a URL.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// HTTP request failed (connection, timeout, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    /// A login or refresh response carried no access token.
    #[error("Response did not include an access token")]
    MissingAccessToken,

    /// JSON did not have the expected shape.
    #[error("Unexpected response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether the backend rejected the credentials themselves.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Status { status, .. }
                if *status == reqwest::StatusCode::UNAUTHORIZED
                    || *status == reqwest::StatusCode::FORBIDDEN
        )
    }
}
