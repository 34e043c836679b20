//! Wire types for the backend API and their conversions.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use barker_core::shipping::{PostalRule, ShippingZone};
use barker_core::{UserId, ZoneId};

// =============================================================================
// Shipping zones
// =============================================================================

/// Zone list as returned by the backend: a paginated page or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ZoneListing {
    Page(ZonePage),
    Bare(Vec<ShippingZoneRecord>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZonePage {
    pub results: Vec<ShippingZoneRecord>,
    #[serde(default)]
    pub next: Option<String>,
}

impl ZoneListing {
    fn into_zones(self) -> Vec<ShippingZone> {
        let records = match self {
            Self::Page(page) => page.results,
            Self::Bare(records) => records,
        };
        records.into_iter().map(ShippingZone::from).collect()
    }
}

/// Decode a saved `shipping-zones/` response (one page or a bare array).
///
/// # Errors
///
/// Returns `serde_json::Error` if the text is not a zone listing.
pub fn parse_zone_export(json: &str) -> Result<Vec<ShippingZone>, serde_json::Error> {
    serde_json::from_str::<ZoneListing>(json).map(ZoneListing::into_zones)
}

/// A zone as the backend serializes it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShippingZoneRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_codes: Option<String>,
    /// Older records carry the codes under the singular name.
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub shipping_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub base_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub cost_per_kg: Option<Decimal>,
    #[serde(default)]
    pub estimated_days: Option<u32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl From<ShippingZoneRecord> for ShippingZone {
    fn from(record: ShippingZoneRecord) -> Self {
        let codes = record
            .postal_codes
            .filter(|codes| !codes.trim().is_empty())
            .or(record.postal_code)
            .unwrap_or_default();
        let base_cost = record.base_cost.unwrap_or_default();

        Self {
            id: ZoneId::new(record.id),
            name: record.name,
            province: record.province,
            city: record.city,
            rule: PostalRule::parse(&codes),
            shipping_price: record.shipping_price.unwrap_or(base_cost),
            base_cost,
            cost_per_kg: record.cost_per_kg.unwrap_or_default(),
            estimated_days: record.estimated_days.unwrap_or_default(),
            is_active: record.is_active,
        }
    }
}

/// Decimal given as a JSON string or number; blank strings and null are absent.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse().map(Some).map_err(D::Error::custom),
        Value::Number(n) => n.to_string().parse().map(Some).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected decimal, got {other}"))),
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginWire {
    #[serde(default)]
    pub access: Option<String>,
    /// Legacy deployments return the access token as `token`.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshWire {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Error body shapes the backend uses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.detail).or(self.error)
    }
}

/// Who logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Option<UserId>,
    pub username: String,
    pub name: String,
    pub roles: Vec<String>,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub access: SecretString,
    pub refresh: Option<SecretString>,
    pub user: UserProfile,
}

impl TryFrom<LoginWire> for LoginResponse {
    type Error = super::ApiError;

    fn try_from(wire: LoginWire) -> Result<Self, Self::Error> {
        let access = wire
            .access
            .filter(|a| !a.is_empty())
            .or(wire.token)
            .filter(|a| !a.is_empty())
            .ok_or(super::ApiError::MissingAccessToken)?;

        Ok(Self {
            access: SecretString::from(access),
            refresh: wire.refresh.filter(|r| !r.is_empty()).map(SecretString::from),
            user: UserProfile {
                id: wire.id.map(UserId::new),
                username: wire.username.unwrap_or_default(),
                name: wire.name.unwrap_or_default(),
                roles: wire.roles.unwrap_or_default(),
            },
        })
    }
}

/// Successful refresh. `refresh` is only present when the backend rotates it.
#[derive(Debug, Clone)]
pub struct RefreshResponse {
    pub access: SecretString,
    pub refresh: Option<SecretString>,
}

impl TryFrom<RefreshWire> for RefreshResponse {
    type Error = super::ApiError;

    fn try_from(wire: RefreshWire) -> Result<Self, Self::Error> {
        let access = wire
            .access
            .filter(|a| !a.is_empty())
            .ok_or(super::ApiError::MissingAccessToken)?;
        Ok(Self {
            access: SecretString::from(access),
            refresh: wire.refresh.filter(|r| !r.is_empty()).map(SecretString::from),
        })
    }
}
