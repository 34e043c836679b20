//! Coarse authorization roles derived from token claims.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::claims::{Claims, is_truthy, parse_jwt};

/// A role as seen by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// `ROLE_ADMIN`: back-office access.
    Admin,
    /// `ROLE_CLIENT`: a registered customer.
    Client,
    /// `ROLE_PUBLIC`
    Public,
    /// Anything else, upper-cased.
    Other(String),
}

impl Role {
    pub const ADMIN: &'static str = "ROLE_ADMIN";
    pub const CLIENT: &'static str = "ROLE_CLIENT";
    pub const PUBLIC: &'static str = "ROLE_PUBLIC";

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => Self::ADMIN,
            Self::Client => Self::CLIENT,
            Self::Public => Self::PUBLIC,
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Normalize a free-form role string.
    ///
    /// Matching is case-insensitive and by substring: anything mentioning
    /// `admin` (or the `is_staff`/`is_superuser` flag names) is an admin;
    /// `client`, `user` or `customer` is a client; `public` is public. Other
    /// values are upper-cased. Blank input has no role.
    #[must_use]
    pub fn from_name(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lower = trimmed.to_lowercase();
        let role = if lower.contains("admin") || lower == "is_staff" || lower == "is_superuser" {
            Self::Admin
        } else if lower.contains("client") || lower.contains("user") || lower.contains("customer")
        {
            Self::Client
        } else if lower.contains("public") {
            Self::Public
        } else {
            Self::Other(trimmed.to_uppercase())
        };
        Some(role)
    }

    /// Normalize a claim value.
    ///
    /// Arrays contribute only their first element. A bare `true` comes from
    /// the `is_staff`/`is_superuser` flags and therefore means admin.
    #[must_use]
    pub fn from_claim(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.first().and_then(Self::from_claim),
            Value::String(s) => Self::from_name(s),
            Value::Bool(true) => Some(Self::Admin),
            Value::Number(n) => Self::from_name(&n.to_string()),
            Value::Bool(false) | Value::Null | Value::Object(_) => None,
        }
    }

    /// Role embedded in a token's claims, if any.
    #[must_use]
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        claims.role_claim().and_then(Self::from_claim)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_name(&raw).ok_or_else(|| serde::de::Error::custom("empty role"))
    }
}

/// Whether a token's claims mark an administrator.
///
/// True when any of `is_staff`, `is_admin`, `is_superuser` is truthy, or the
/// `roles` array holds `ROLE_ADMIN` or `admin` (compared case-insensitively).
/// Undecodable tokens are never admin.
#[must_use]
pub fn is_admin_from_token(token: &str) -> bool {
    parse_jwt(token).is_some_and(|claims| is_admin_claims(&claims))
}

/// [`is_admin_from_token`] for already decoded claims.
#[must_use]
pub fn is_admin_claims(claims: &Claims) -> bool {
    let flagged = ["is_staff", "is_admin", "is_superuser"]
        .iter()
        .any(|flag| claims.get(flag).is_some_and(is_truthy));
    if flagged {
        return true;
    }

    claims
        .get("roles")
        .and_then(Value::as_array)
        .is_some_and(|roles| {
            roles.iter().filter_map(Value::as_str).any(|role| {
                role.eq_ignore_ascii_case(Role::ADMIN) || role.eq_ignore_ascii_case("admin")
            })
        })
}

/// Role to mirror into the `role` cookie after a login or refresh.
///
/// The first role reported by the login endpoint wins; without one the
/// access token decides between admin and client.
#[must_use]
pub fn role_for_tokens(access: Option<&str>, login_roles: &[String]) -> Role {
    if let Some(role) = login_roles.first().and_then(|r| Role::from_name(r)) {
        return role;
    }
    if access.is_some_and(is_admin_from_token) {
        Role::Admin
    } else {
        Role::Client
    }
}
