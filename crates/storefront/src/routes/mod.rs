//! HTTP routes for the storefront front server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Checkout
//! POST /api/shipping/quote     - Shipping price for a postal code
//!
//! # Auth
//! POST /auth/login             - Login (rate limited), sets token/role cookies
//! POST /auth/logout            - Expire token/role cookies
//!
//! # Everything else
//! GET  /*                      - Exported frontend from the static directory
//! ```
//!
//! The route guard wraps the whole router, so `/admin` and `/checkout` pages
//! served from the static directory are protected the same as any handler.

pub mod auth;
pub mod shipping;

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{auth_rate_limiter, request_id_middleware, route_guard_middleware};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
}

/// Create the checkout API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/shipping/quote", post(shipping::quote))
}

/// Create all handler routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}

/// The full application: handlers, static fallback, guard and tracing.
///
/// Sentry layers are added by the binary on top of this.
pub fn app(state: AppState) -> Router {
    let guard = state.guard();
    let static_files = ServeDir::new(&state.config().static_dir);

    routes()
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(trace_layer())
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(axum::middleware::from_fn_with_state(
                    guard,
                    route_guard_middleware,
                )),
        )
        .with_state(state)
}

/// Request span with status and latency recorded on response.
fn trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    impl Fn(&Request<Body>) -> Span + Clone,
    DefaultOnRequest,
    impl Fn(&Response<Body>, Duration, &Span) + Clone,
> {
    TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                status = tracing::field::Empty,
                latency_ms = tracing::field::Empty,
            )
        })
        .on_response(|response: &Response<Body>, latency: Duration, span: &Span| {
            span.record("status", response.status().as_u16());
            span.record(
                "latency_ms",
                u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            );
            DefaultOnResponse::default().on_response(response, latency, span);
        })
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
