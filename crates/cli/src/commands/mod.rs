//! CLI command implementations.

pub mod quote;
pub mod session;
pub mod token;

use barker_storefront::config::DEFAULT_API_BASE;

/// Backend base URL: the `--api` flag, then `BARKER_API_BASE`, then production.
pub fn api_base(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("BARKER_API_BASE").ok())
        .map(|base| base.trim().to_string())
        .filter(|base| !base.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}
