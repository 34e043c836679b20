//! Token claims and role derivation.
//!
//! Shared by the token lifecycle manager (which needs `exp` to schedule
//! refreshes) and the route guard (which needs `exp` and the role).

pub mod claims;
pub mod role;

pub use claims::{Claims, encode_unsigned, is_truthy, parse_jwt};
pub use role::{Role, is_admin_claims, is_admin_from_token, role_for_tokens};
