//! Typed wrappers over the endpoint families the CLI uses.
//!
//! Each wrapper borrows an [`ApiClient`](crate::client::ApiClient) and returns the raw
//! JSON so that `--json` can print it untouched; listing wrappers also implement
//! [`PageSource`](crate::traits::PageSource) for name resolution.

pub mod challenges;
pub mod machines;
pub mod prolabs;
pub mod pwnbox;
pub mod sherlocks;
pub mod user;
pub mod vm;
pub mod vpn;

use crate::config::MAX_PER_PAGE;

/// `page`/`per_page` query pairs, with `per_page` clamped to what the API accepts.
pub(crate) fn page_query(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![
        ("page", page.max(1).to_string()),
        ("per_page", per_page.clamp(1, MAX_PER_PAGE).to_string()),
    ]
}
