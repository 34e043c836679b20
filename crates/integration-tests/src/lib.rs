//! Integration tests for the Barker storefront.
//!
//! The app is driven in-process with `tower::ServiceExt::oneshot`; the
//! Barker backend is a `wiremock` server. Nothing needs to be running.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p barker-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `route_guard` - cookie access rules through the full router
//! - `shipping_quote` - checkout quotes against a mocked zone list
//! - `auth_flow` - login/logout cookies and the client-side token lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use serde_json::{Value, json};

use barker_core::auth::encode_unsigned;
use barker_storefront::api::BackendClient;
use barker_storefront::config::StorefrontConfig;
use barker_storefront::middleware::RouteGuard;
use barker_storefront::routes;
use barker_storefront::services::ZoneService;
use barker_storefront::session::ManualClock;
use barker_storefront::state::AppState;

/// Fixed "now" for guard decisions and minted tokens.
pub const NOW_SECS: i64 = 1_700_000_000;

/// Pages written into the static directory, by request path.
const PAGES: &[(&str, &str)] = &[
    ("index.html", "home"),
    ("admin", "admin dashboard"),
    ("checkout", "checkout"),
    ("login", "login"),
    ("register", "register"),
    ("productos", "catalog"),
];

/// An app wired to a mock backend, a throwaway static directory and a
/// fixed clock.
pub struct TestApp {
    pub router: Router,
    pub static_dir: PathBuf,
}

impl TestApp {
    /// Build the full router against `backend_url`.
    ///
    /// # Panics
    ///
    /// Panics if the static directory cannot be written or the config is
    /// rejected.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn new(backend_url: &str) -> Self {
        let static_dir = std::env::temp_dir().join(format!("barker-static-{}", uuid::Uuid::new_v4()));
        write_pages(&static_dir).unwrap();

        let vars = HashMap::from([
            ("BARKER_API_BASE".to_string(), backend_url.to_string()),
            (
                "BARKER_STATIC_DIR".to_string(),
                static_dir.display().to_string(),
            ),
            ("BARKER_ZONE_CACHE_TTL_SECS".to_string(), "0".to_string()),
        ]);
        let config = StorefrontConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let backend = BackendClient::new(&config.api_base).unwrap();
        let zones = ZoneService::new(backend.clone(), config.zone_cache_ttl);
        let guard = Arc::new(RouteGuard::with_clock(
            config.guard.clone(),
            Arc::new(ManualClock::new(NOW_SECS * 1000)),
        ));
        let state = AppState::from_parts(config, backend, zones, guard);

        Self {
            router: routes::app(state),
            static_dir,
        }
    }

    /// Send one request through a fresh clone of the router.
    ///
    /// # Panics
    ///
    /// Panics if the router errors, which it never does for well-formed
    /// requests.
    #[allow(clippy::unwrap_used)]
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.static_dir);
    }
}

fn write_pages(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for (name, body) in PAGES {
        std::fs::write(dir.join(name), body)?;
    }
    Ok(())
}

/// `GET path` carrying the given cookies.
///
/// # Panics
///
/// Panics on an invalid path.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn get(path: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if !cookies.is_empty() {
        let header_value = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header(header::COOKIE, header_value);
    }
    builder.body(Body::empty()).unwrap()
}

/// `POST path` with a JSON body, from a fixed client address.
///
/// # Panics
///
/// Panics on an invalid path.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Response body as text.
///
/// # Panics
///
/// Panics if the body cannot be read or is not UTF-8.
#[allow(clippy::unwrap_used)]
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Response body as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
#[allow(clippy::unwrap_used)]
pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Every `Set-Cookie` header value.
#[must_use]
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Unsigned token expiring `ttl_secs` after [`NOW_SECS`] with extra claims.
#[must_use]
pub fn token(ttl_secs: i64, claims: &Value) -> String {
    let mut payload = json!({ "exp": NOW_SECS + ttl_secs });
    if let (Some(map), Some(extra)) = (payload.as_object_mut(), claims.as_object()) {
        map.extend(extra.clone());
    }
    encode_unsigned(&payload)
}
