pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::{HarvestError, QuotaScope};
pub use text::*;
pub use types::*;

/// Extract the host portion of a URL for rate-limiter keying.
/// Falls back to the raw input when it does not parse as a URL.
///
/// ```
/// assert_eq!(jobharvest_common::extract_domain("https://www.careers24.com/rss/jobs"), "www.careers24.com");
/// assert_eq!(jobharvest_common::extract_domain("not a url"), "not a url");
/// ```
pub fn extract_domain(url: &str) -> String {
    url.split("//")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .filter(|host| !host.is_empty())
        .unwrap_or(url)
        .to_string()
}
