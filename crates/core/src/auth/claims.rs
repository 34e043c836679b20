//! Unverified JWT payload decoding.
//!
//! Signatures are never checked here: the backend verifies tokens on every
//! API call. The storefront only reads `exp` and role claims to schedule
//! refreshes and to gate navigation.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

/// Standard alphabet, padding optional (JWT segments are unpadded).
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims that may carry a role, in lookup order.
const ROLE_CLAIM_KEYS: &[&str] = &[
    "roles",
    "role",
    "role_name",
    "groups",
    "group",
    "is_staff",
    "is_superuser",
];

/// Decoded JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Claims(Map<String, Value>);

impl Claims {
    #[must_use]
    pub const fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Expiry in seconds since the epoch. Absent, null and zero all read as
    /// "no expiry".
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Fractional epochs are floored
    pub fn exp(&self) -> Option<i64> {
        let exp = match self.0.get("exp")? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.floor() as i64))?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (exp != 0).then_some(exp)
    }

    /// A token whose expiry lies strictly before `now_secs`. Tokens without
    /// expiry never expire.
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.exp().is_some_and(|exp| exp < now_secs)
    }

    /// The first truthy role-bearing claim.
    #[must_use]
    pub fn role_claim(&self) -> Option<&Value> {
        ROLE_CLAIM_KEYS
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| is_truthy(value))
    }
}

/// Decode the payload segment of a dot-delimited JWT.
///
/// Returns `None` for anything that is not three segments whose middle is a
/// base64url-encoded UTF-8 JSON object.
#[must_use]
pub fn parse_jwt(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    if payload.is_empty() {
        return None;
    }

    let standard: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = PAYLOAD_ENGINE.decode(standard).ok()?;
    let json = String::from_utf8(bytes).ok()?;

    match serde_json::from_str::<Value>(&json).ok()? {
        Value::Object(map) => Some(Claims(map)),
        _ => None,
    }
}

/// Loose truthiness for flag claims such as `is_staff`.
///
/// `false`, `null`, `0`, `""` are falsy; arrays and objects are truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Build an unsigned token around a payload. Test helper for callers that
/// need realistic tokens without a signing key.
#[must_use]
pub fn encode_unsigned(payload: &Value) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.sig")
}
