//! Cookie mirror of the session for the route guard.
//!
//! The guard only sees request cookies, so the access token and a derived
//! role are copied into two cookies whenever tokens are saved. They are not
//! `HttpOnly`: page scripts keep them in sync with local storage.

use std::sync::{Mutex, PoisonError};

use cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use barker_core::auth::Role;

use super::StorageError;

/// Cookie holding the raw access token.
pub const TOKEN_COOKIE: &str = "token";
/// Cookie holding the normalized role string.
pub const ROLE_COOKIE: &str = "role";
/// Eight hours.
pub const COOKIE_MAX_AGE_SECS: i64 = 28_800;

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(Duration::seconds(COOKIE_MAX_AGE_SECS))
        .same_site(SameSite::Lax)
        .http_only(false)
        .build()
}

/// `token` cookie carrying an access token.
#[must_use]
pub fn token_cookie(access: &str) -> Cookie<'static> {
    session_cookie(TOKEN_COOKIE, access.to_string())
}

/// `role` cookie carrying a role name.
#[must_use]
pub fn role_cookie(role: &Role) -> Cookie<'static> {
    session_cookie(ROLE_COOKIE, role.as_str().to_string())
}

/// A cookie that deletes `name` in the browser: empty value, zero max-age
/// and an expiry at the Unix epoch.
#[must_use]
pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .same_site(SameSite::Lax)
        .http_only(false)
        .build()
}

/// Receives cookies the token manager wants set.
pub trait CookieSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the cookie cannot be recorded.
    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), StorageError>;
}

/// In-memory cookie jar.
///
/// Keeps the last cookie written under each name, expired ones included, so
/// callers can inspect exactly what would have been sent.
#[derive(Debug, Default)]
pub struct CookieJarMirror {
    jar: Mutex<CookieJar>,
}

impl CookieJarMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last cookie written under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Cookie<'static>> {
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Value of a live cookie; expired or empty cookies read as absent.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|c| !is_expired(c))
            .map(|c| c.value().to_string())
    }

    /// Every cookie in the jar, rendered as `Set-Cookie` header values.
    #[must_use]
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl CookieSink for CookieJarMirror {
    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), StorageError> {
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_original(cookie);
        Ok(())
    }
}

/// Whether a cookie instructs the browser to drop it.
#[must_use]
pub fn is_expired(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty()
        || cookie.max_age().is_some_and(|age| age <= Duration::ZERO)
        || cookie
            .expires_datetime()
            .is_some_and(|at| at <= OffsetDateTime::now_utc())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cookie_attributes() {
        let cookie = token_cookie("abc.def.ghi");
        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.value(), "abc.def.ghi");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(28_800)));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(false));
        assert!(!is_expired(&cookie));
    }

    #[test]
    fn test_role_cookie_uses_role_name() {
        assert_eq!(role_cookie(&Role::Admin).value(), "ROLE_ADMIN");
        assert_eq!(
            role_cookie(&Role::Other("VENDEDOR".to_string())).value(),
            "VENDEDOR"
        );
    }

    #[test]
    fn test_expired_cookie_renders_past_expiry() {
        let cookie = expired_cookie(ROLE_COOKIE);
        assert!(is_expired(&cookie));

        let header = cookie.to_string();
        assert!(header.starts_with("role=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(!header.contains("HttpOnly"));
    }

    #[test]
    fn test_mirror_keeps_last_write() {
        let mirror = CookieJarMirror::new();
        mirror.set_cookie(token_cookie("one")).unwrap();
        assert_eq!(mirror.value(TOKEN_COOKIE).as_deref(), Some("one"));

        mirror.set_cookie(expired_cookie(TOKEN_COOKIE)).unwrap();
        assert_eq!(mirror.value(TOKEN_COOKIE), None);
        assert!(mirror.get(TOKEN_COOKIE).is_some());
        assert_eq!(mirror.set_cookie_headers().len(), 1);
    }
}
