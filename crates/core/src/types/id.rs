//! Newtype IDs for backend entity references.
//!
//! The backend hands out plain integer ids for every resource. Wrapping them
//! keeps a zone id from being passed where a product id is expected.

/// Macro to define a type-safe ID wrapper around an `i64`.
///
/// Generated types are `Copy`, hashable, serialize transparently and
/// convert to and from `i64`.
///
/// # Example
///
/// ```rust
/// # use barker_core::define_id;
/// define_id!(OrderId);
/// define_id!(CategoryId);
///
/// let order = OrderId::new(7);
/// assert_eq!(order.as_i64(), 7);
/// assert_eq!(order.to_string(), "7");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw backend id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw backend id.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ZoneId);
define_id!(UserId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_bare_integers() {
        let id = ZoneId::new(12);
        assert_eq!(serde_json::to_string(&id).unwrap(), "12");

        let parsed: UserId = serde_json::from_str("99").unwrap();
        assert_eq!(parsed, UserId::new(99));
    }
}
