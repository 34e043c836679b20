//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Route guard (cookie-based access control)
//! 5. Rate limiting on `/auth/login` (governor)

pub mod rate_limit;
pub mod request_id;
pub mod route_guard;

pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use route_guard::{GuardDecision, RouteGuard, RouteGuardConfig, route_guard_middleware};
