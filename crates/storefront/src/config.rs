//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `BARKER_HOST` - Bind address (default: 127.0.0.1)
//! - `BARKER_PORT` - Listen port (default: 3000)
//! - `BARKER_API_BASE` - Backend REST base URL (default: <https://barker.sistemataup.online/api>)
//! - `BARKER_STATIC_DIR` - Exported frontend served for unmatched paths (default: `dist`)
//! - `BARKER_ZONE_CACHE_TTL_SECS` - How long fetched shipping zones are reused (default: 300)
//! - `BARKER_ADMIN_PREFIXES` - Comma separated admin-only path prefixes (default: `/admin`)
//! - `BARKER_CLIENT_PREFIXES` - Comma separated sign-in-required prefixes (default: `/checkout`)
//! - `BARKER_AUTH_PREFIXES` - Comma separated login/register prefixes (default: `/login,/register`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::middleware::RouteGuardConfig;

/// Backend used when `BARKER_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "https://barker.sistemataup.online/api";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Backend REST base URL, without trailing slash
    pub api_base: String,
    /// Directory with the exported frontend
    pub static_dir: PathBuf,
    /// Shipping zone cache lifetime
    pub zone_cache_ttl: Duration,
    /// Route guard path classes
    pub guard: RouteGuardConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env.parsed("BARKER_HOST", "127.0.0.1")?;
        let port = env.parsed("BARKER_PORT", "3000")?;
        let api_base = env.or_default("BARKER_API_BASE", DEFAULT_API_BASE);
        url::Url::parse(&api_base)
            .map_err(|e| ConfigError::InvalidEnvVar("BARKER_API_BASE".to_string(), e.to_string()))?;
        let static_dir = PathBuf::from(env.or_default("BARKER_STATIC_DIR", "dist"));
        let zone_cache_ttl =
            Duration::from_secs(env.parsed("BARKER_ZONE_CACHE_TTL_SECS", "300")?);

        let defaults = RouteGuardConfig::default();
        let guard = RouteGuardConfig {
            admin_prefixes: env.prefixes("BARKER_ADMIN_PREFIXES", defaults.admin_prefixes)?,
            client_prefixes: env.prefixes("BARKER_CLIENT_PREFIXES", defaults.client_prefixes)?,
            auth_prefixes: env.prefixes("BARKER_AUTH_PREFIXES", defaults.auth_prefixes)?,
            ..defaults
        };

        Ok(Self {
            host,
            port,
            api_base: api_base.trim_end_matches('/').to_string(),
            static_dir,
            zone_cache_ttl,
            guard,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Non-blank value of a variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Comma separated path prefixes. Each must start with `/`.
    fn prefixes(&self, key: &str, default: Vec<String>) -> Result<Vec<String>, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };

        let prefixes = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                if p.starts_with('/') {
                    Ok(p.to_string())
                } else {
                    Err(ConfigError::InvalidEnvVar(
                        key.to_string(),
                        format!("prefix '{p}' must start with '/'"),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Each guarded area needs at least one prefix.
        if prefixes.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "no path prefixes given".to_string(),
            ));
        }
        Ok(prefixes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.static_dir, PathBuf::from("dist"));
        assert_eq!(config.zone_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.guard, RouteGuardConfig::default());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("BARKER_HOST", "0.0.0.0"),
            ("BARKER_PORT", "8080"),
            ("BARKER_API_BASE", "http://localhost:8000/api/"),
            ("BARKER_ADMIN_PREFIXES", "/admin, /panel"),
            ("BARKER_ZONE_CACHE_TTL_SECS", "0"),
            ("SENTRY_DSN", "  "),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.api_base, "http://localhost:8000/api");
        assert_eq!(config.guard.admin_prefixes, vec!["/admin", "/panel"]);
        assert_eq!(config.guard.login_path, "/login");
        assert_eq!(config.zone_cache_ttl, Duration::ZERO);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("BARKER_PORT", "http")]),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "BARKER_PORT"
        ));
        assert!(matches!(
            load(&[("BARKER_API_BASE", "barker")]),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "BARKER_API_BASE"
        ));
        assert!(matches!(
            load(&[("BARKER_CLIENT_PREFIXES", "checkout")]),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "BARKER_CLIENT_PREFIXES"
        ));
    }

    #[test]
    fn test_empty_prefix_lists_rejected() {
        for (key, value) in [
            ("BARKER_ADMIN_PREFIXES", ","),
            ("BARKER_CLIENT_PREFIXES", " , ,"),
            ("BARKER_AUTH_PREFIXES", ","),
        ] {
            assert!(matches!(
                load(&[(key, value)]),
                Err(ConfigError::InvalidEnvVar(k, _)) if k == key
            ));
        }
    }
}
