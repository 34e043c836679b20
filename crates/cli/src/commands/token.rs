//! Access token inspection.

use barker_core::auth::{Role, is_admin_claims, parse_jwt};
use barker_storefront::session::{Clock, SystemClock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Not a JWT: expected three dot-separated segments with a JSON payload")]
    Malformed,

    #[error("Failed to print claims: {0}")]
    Json(#[from] serde_json::Error),
}

/// Print a token's claims, expiry and role. The signature is not checked.
pub fn inspect(token: &str) -> Result<(), TokenError> {
    let claims = parse_jwt(token.trim()).ok_or(TokenError::Malformed)?;
    let now = SystemClock.now_secs();

    let expiry = match claims.exp() {
        None => "no expiry".to_string(),
        Some(exp) if claims.is_expired_at(now) => format!("expired {}s ago", now - exp),
        Some(exp) => format!("expires in {}s", exp - now),
    };
    let role = Role::from_claims(&claims).map_or_else(|| "none".to_string(), |r| r.to_string());

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(claims.as_map())?);
        println!("Expiry: {expiry}");
        println!("Role: {role}");
        println!("Admin: {}", is_admin_claims(&claims));
    }

    Ok(())
}
