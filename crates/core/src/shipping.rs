//! Shipping zones and postal-code resolution.
//!
//! Admins configure zones in the back-office. Each zone's `postal_codes`
//! field holds either a comma separated list of codes (`"1425, 1426,1427"`)
//! or a single range token (`"RANGO:1000-1999"`). The field is decoded into a
//! [`PostalRule`] once, when zones are loaded, so lookups never re-parse it.
//!
//! Resolution walks zones in the order the backend returned them and the
//! first matching zone wins. Overlapping zones are not detected: authoring
//! order decides.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ZoneId;

/// Marker that switches a zone's code field to range interpretation.
pub const RANGE_MARKER: &str = "RANGO:";

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RANGO:(\d+)-(\d+)").expect("range pattern is a valid regex")
});

/// Why a postal code produced no shipping price.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "postal_code", rename_all = "snake_case")]
pub enum ShippingError {
    /// The code is not an integer.
    #[error("Código postal inválido: {0}")]
    InvalidPostalCode(String),

    /// No configured zone covers the code.
    #[error("No hay envíos disponibles para el código postal {0}")]
    NoZoneFound(String),
}

impl ShippingError {
    /// The postal code the customer typed.
    #[must_use]
    pub fn postal_code(&self) -> &str {
        match self {
            Self::InvalidPostalCode(code) | Self::NoZoneFound(code) => code,
        }
    }
}

/// Matching rule decoded from a zone's `postal_codes` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostalRule {
    /// Explicit list of codes, compared as strings.
    ExactCodes { codes: Vec<String> },
    /// Inclusive numeric interval.
    Range { min: i64, max: i64 },
    /// The field carries the range marker but no readable `min-max` pair.
    /// Such a zone never matches.
    MalformedRange { raw: String },
}

impl PostalRule {
    /// Decode the wire representation.
    ///
    /// Any occurrence of `RANGO:` forces range interpretation of the whole
    /// field; trailing comma-separated codes next to a range are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.contains(RANGE_MARKER) {
            return RANGE_PATTERN
                .captures(raw)
                .and_then(|caps| {
                    let min = caps.get(1)?.as_str().parse::<i64>().ok()?;
                    let max = caps.get(2)?.as_str().parse::<i64>().ok()?;
                    Some(Self::Range { min, max })
                })
                .unwrap_or_else(|| Self::MalformedRange {
                    raw: raw.to_string(),
                });
        }

        let codes = raw
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(String::from)
            .collect();
        Self::ExactCodes { codes }
    }

    /// Whether this rule covers a postal code.
    ///
    /// `raw` is the code exactly as the customer typed it and `numeric` its
    /// integer value; list rules compare the former, ranges the latter.
    #[must_use]
    pub fn matches(&self, raw: &str, numeric: i64) -> bool {
        match self {
            Self::ExactCodes { codes } => codes.iter().any(|code| code == raw),
            Self::Range { min, max } => (*min..=*max).contains(&numeric),
            Self::MalformedRange { .. } => false,
        }
    }

    /// Render back to the admin-facing wire format.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Self::ExactCodes { codes } => codes.join(","),
            Self::Range { min, max } => format!("{RANGE_MARKER}{min}-{max}"),
            Self::MalformedRange { raw } => raw.clone(),
        }
    }
}

/// An admin-configured shipping-cost rule.
///
/// Only `rule` and `shipping_price` take part in resolution; the remaining
/// fields are carried for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: ZoneId,
    pub name: String,
    pub province: String,
    pub city: String,
    pub rule: PostalRule,
    pub shipping_price: Decimal,
    pub base_cost: Decimal,
    pub cost_per_kg: Decimal,
    pub estimated_days: u32,
    pub is_active: bool,
}

impl ShippingZone {
    /// A zone with only the fields resolution needs; display fields are empty.
    #[must_use]
    pub fn new(id: ZoneId, postal_codes: &str, shipping_price: Decimal) -> Self {
        Self {
            id,
            name: String::new(),
            province: String::new(),
            city: String::new(),
            rule: PostalRule::parse(postal_codes),
            shipping_price,
            base_cost: shipping_price,
            cost_per_kg: Decimal::ZERO,
            estimated_days: 0,
            is_active: true,
        }
    }
}

/// Parse a customer-entered postal code to its integer value.
///
/// # Errors
///
/// Returns [`ShippingError::InvalidPostalCode`] unless the trimmed input is a
/// non-empty run of ASCII digits that fits in an `i64`.
pub fn parse_postal_code(postal_code: &str) -> Result<i64, ShippingError> {
    let trimmed = postal_code.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ShippingError::InvalidPostalCode(postal_code.to_string()));
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| ShippingError::InvalidPostalCode(postal_code.to_string()))
}

/// Find the first zone, in list order, that covers `postal_code`.
///
/// # Errors
///
/// [`ShippingError::InvalidPostalCode`] for non-numeric input, otherwise
/// [`ShippingError::NoZoneFound`] when nothing matches (including an empty
/// zone list).
pub fn find_zone<'a>(
    postal_code: &str,
    zones: &'a [ShippingZone],
) -> Result<&'a ShippingZone, ShippingError> {
    let numeric = parse_postal_code(postal_code)?;
    zones
        .iter()
        .find(|zone| zone.rule.matches(postal_code, numeric))
        .ok_or_else(|| ShippingError::NoZoneFound(postal_code.to_string()))
}

/// Shipping price for a postal code.
///
/// # Errors
///
/// See [`find_zone`].
pub fn resolve_shipping_price(
    postal_code: &str,
    zones: &[ShippingZone],
) -> Result<Decimal, ShippingError> {
    find_zone(postal_code, zones).map(|zone| zone.shipping_price)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn zone(id: i64, codes: &str, price: i64) -> ShippingZone {
        ShippingZone::new(ZoneId::new(id), codes, Decimal::new(price, 0))
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            PostalRule::parse("RANGO:1000-1999"),
            PostalRule::Range {
                min: 1000,
                max: 1999
            }
        );
    }

    #[test]
    fn test_parse_list_trims_and_drops_empty() {
        assert_eq!(
            PostalRule::parse(" 1425, 1426,1427,,"),
            PostalRule::ExactCodes {
                codes: vec!["1425".into(), "1426".into(), "1427".into()]
            }
        );
    }

    #[test]
    fn test_range_marker_anywhere_forces_range() {
        assert_eq!(
            PostalRule::parse("5000, RANGO:1000-2000, 7000"),
            PostalRule::Range {
                min: 1000,
                max: 2000
            }
        );
        assert!(matches!(
            PostalRule::parse("1425,RANGO:abc"),
            PostalRule::MalformedRange { .. }
        ));
    }

    #[test]
    fn test_range_overflow_is_malformed() {
        let rule = PostalRule::parse("RANGO:1-99999999999999999999999");
        assert!(matches!(rule, PostalRule::MalformedRange { .. }));
        assert!(!rule.matches("5", 5));
    }

    #[test]
    fn test_range_boundaries() {
        let zones = vec![zone(1, "RANGO:1000-1999", 350)];
        for code in ["1000", "1500", "1999"] {
            assert_eq!(
                resolve_shipping_price(code, &zones),
                Ok(Decimal::new(350, 0)),
                "{code} should match"
            );
        }
        for code in ["999", "2000"] {
            assert_eq!(
                resolve_shipping_price(code, &zones),
                Err(ShippingError::NoZoneFound(code.to_string()))
            );
        }
    }

    #[test]
    fn test_list_match_with_inconsistent_whitespace() {
        let zones = vec![zone(1, "1425, 1426,1427", 800)];
        assert_eq!(
            resolve_shipping_price("1426", &zones),
            Ok(Decimal::new(800, 0))
        );
    }

    #[test]
    fn test_first_match_wins_over_more_specific() {
        let zones = vec![zone(1, "RANGO:1000-2000", 100), zone(2, "1500", 200)];
        assert_eq!(
            resolve_shipping_price("1500", &zones),
            Ok(Decimal::new(100, 0))
        );
        assert_eq!(find_zone("1500", &zones).unwrap().id, ZoneId::new(1));
    }

    #[test]
    fn test_non_numeric_is_invalid_regardless_of_zones() {
        let zones = vec![zone(1, "abc1", 100)];
        assert_eq!(
            resolve_shipping_price("abc1", &zones),
            Err(ShippingError::InvalidPostalCode("abc1".to_string()))
        );
        assert!(matches!(
            resolve_shipping_price("", &zones),
            Err(ShippingError::InvalidPostalCode(_))
        ));
        assert!(matches!(
            resolve_shipping_price("-100", &zones),
            Err(ShippingError::InvalidPostalCode(_))
        ));
    }

    #[test]
    fn test_empty_zone_list() {
        assert_eq!(
            resolve_shipping_price("1425", &[]),
            Err(ShippingError::NoZoneFound("1425".to_string()))
        );
    }

    #[test]
    fn test_list_compares_original_string() {
        // Numeric equality is not enough for list rules.
        let zones = vec![zone(1, "1425", 100)];
        assert!(resolve_shipping_price("01425", &zones).is_err());
        assert!(resolve_shipping_price("1425", &zones).is_ok());
    }

    #[test]
    fn test_inactive_zones_still_resolve() {
        let mut inactive = zone(1, "1425", 100);
        inactive.is_active = false;
        assert_eq!(
            resolve_shipping_price("1425", &[inactive]),
            Ok(Decimal::new(100, 0))
        );
    }

    #[test]
    fn test_error_message_names_code() {
        let err = ShippingError::NoZoneFound("9410".to_string());
        assert!(err.to_string().contains("9410"));
        assert_eq!(err.postal_code(), "9410");
    }

    #[test]
    fn test_to_wire() {
        assert_eq!(PostalRule::parse("RANGO:1-9").to_wire(), "RANGO:1-9");
        assert_eq!(PostalRule::parse("1, 2").to_wire(), "1,2");
    }
}
