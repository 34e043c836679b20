//! Cookie-based route guard.
//!
//! Runs on every request with nothing but the `token` and `role` cookies.
//! It never calls the backend: an expired token is simply no session, and
//! recovery is left to the client-side token manager.
//!
//! # Rules, in order
//!
//! 1. Auth pages (`/login`, `/register`): signed-in users are sent on, to a
//!    safe `redirect` parameter, the admin landing page, or home.
//! 2. Admin pages: anonymous users go to login with `redirect` set; signed-in
//!    non-admins go home.
//! 3. Client pages (checkout): anonymous users go to login with `redirect`
//!    and a `message`; any signed-in role passes.
//! 4. Everything else passes.
//!
//! Paths are matched in canonical form (see [`canonical_path`]), the same
//! way the static file service resolves them, so `/%61dmin` or `//admin`
//! cannot reach an admin page unguarded.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::Cookie;

use barker_core::auth::{Role, parse_jwt};

use crate::session::{Clock, ROLE_COOKIE, SystemClock, TOKEN_COOKIE};

/// Path classes and redirect targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuardConfig {
    pub admin_prefixes: Vec<String>,
    pub client_prefixes: Vec<String>,
    pub auth_prefixes: Vec<String>,
    pub login_path: String,
    pub admin_landing: String,
    pub home_path: String,
    /// Shown on the login page when checkout bounced the user there.
    pub checkout_message: String,
}

impl Default for RouteGuardConfig {
    fn default() -> Self {
        Self {
            admin_prefixes: vec!["/admin".to_string()],
            client_prefixes: vec!["/checkout".to_string()],
            auth_prefixes: vec!["/login".to_string(), "/register".to_string()],
            login_path: "/login".to_string(),
            admin_landing: "/admin".to_string(),
            home_path: "/".to_string(),
            checkout_message: "Inicia sesión para continuar con tu compra".to_string(),
        }
    }
}

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Decides access from session cookies.
pub struct RouteGuard {
    config: RouteGuardConfig,
    clock: Arc<dyn Clock>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(config: RouteGuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(config: RouteGuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    #[must_use]
    pub const fn config(&self) -> &RouteGuardConfig {
        &self.config
    }

    /// Decide a request.
    ///
    /// `token` and `role` are raw cookie values; `now_secs` is compared with
    /// the token's `exp`.
    #[must_use]
    pub fn decide(
        &self,
        path: &str,
        query: Option<&str>,
        token: Option<&str>,
        role: Option<&str>,
        now_secs: i64,
    ) -> GuardDecision {
        let session = session_role(token, role, now_secs);
        let config = &self.config;
        let path = canonical_path(path);
        let path = path.as_str();

        if matches_any(path, &config.auth_prefixes) {
            return match session {
                Some(role) => GuardDecision::Redirect(
                    query
                        .and_then(redirect_param)
                        .filter(|target| !self.is_auth_target(target))
                        .unwrap_or_else(|| {
                            if role.is_admin() {
                                config.admin_landing.clone()
                            } else {
                                config.home_path.clone()
                            }
                        }),
                ),
                None => GuardDecision::Allow,
            };
        }

        if matches_any(path, &config.admin_prefixes) {
            return match session {
                None => GuardDecision::Redirect(self.login_url(path, None)),
                Some(role) if role.is_admin() => GuardDecision::Allow,
                Some(_) => GuardDecision::Redirect(config.home_path.clone()),
            };
        }

        if matches_any(path, &config.client_prefixes) {
            return match session {
                None => GuardDecision::Redirect(
                    self.login_url(path, Some(&config.checkout_message)),
                ),
                Some(_) => GuardDecision::Allow,
            };
        }

        GuardDecision::Allow
    }

    fn login_url(&self, path: &str, message: Option<&str>) -> String {
        let mut url = format!(
            "{}?redirect={}",
            self.config.login_path,
            urlencoding::encode(path)
        );
        if let Some(message) = message {
            url.push_str("&message=");
            url.push_str(&urlencoding::encode(message));
        }
        url
    }

    fn is_auth_target(&self, target: &str) -> bool {
        let path = target.split(['?', '#']).next().unwrap_or_default();
        matches_any(&canonical_path(path), &self.config.auth_prefixes)
    }
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Role of a live session, or `None` when there is no usable token.
///
/// The `role` cookie wins; without it the token's own claims decide. A live
/// token with no role information at all counts as a client.
fn session_role(token: Option<&str>, role: Option<&str>, now_secs: i64) -> Option<Role> {
    let claims = parse_jwt(token?)?;
    if claims.is_expired_at(now_secs) {
        return None;
    }

    Some(
        role.and_then(Role::from_name)
            .or_else(|| Role::from_claims(&claims))
            .unwrap_or(Role::Client),
    )
}

/// Segment-aware prefix test: `/admin` covers `/admin` and `/admin/x`, not
/// `/administrator`.
#[must_use]
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Percent-decode `raw`, drop empty and `.` segments, and resolve `..`.
///
/// `..` never climbs above the root. The result always starts with `/` and
/// has no trailing slash unless it is the root itself.
#[must_use]
pub fn canonical_path(raw: &str) -> String {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Case-insensitive; `path` must already be canonical.
fn matches_any(path: &str, prefixes: &[String]) -> bool {
    let path = path.to_lowercase();
    prefixes
        .iter()
        .any(|prefix| path_has_prefix(&path, &prefix.to_lowercase()))
}

/// The `redirect` query parameter, if it names a path on this site.
fn redirect_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "redirect")
        .map(|(_, value)| value.into_owned())
        .filter(|target| is_same_site_path(target))
}

/// `/x` is accepted; `//host`, `/\host`, absolute URLs and control
/// characters are not.
#[must_use]
pub fn is_same_site_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !target.chars().any(char::is_control)
}

/// Read a cookie from the request's `Cookie` headers.
fn request_cookie(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Apply the guard to a request. Redirects are `307 Temporary Redirect`.
pub async fn route_guard_middleware(
    State(guard): State<Arc<RouteGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let token = request_cookie(&request, TOKEN_COOKIE);
    let role = request_cookie(&request, ROLE_COOKIE);

    let decision = guard.decide(
        request.uri().path(),
        request.uri().query(),
        token.as_deref(),
        role.as_deref(),
        guard.clock.now_secs(),
    );

    match decision {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(target) => {
            tracing::debug!(path = %request.uri().path(), %target, "Route guard redirect");
            Redirect::temporary(&target).into_response()
        }
    }
}
