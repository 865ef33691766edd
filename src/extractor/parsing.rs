//! HTML parsing for the web source's listing and detail pages.

pub mod detail;
pub mod error;
pub mod list;

pub use detail::{DetailPage, DetailParser};
pub use error::{ParseError, ParseResult};
pub use list::{ListingEntry, ListingPage, ListingParser};

use anyhow::{Result, anyhow};
use scraper::Selector;

/// Compile a CSS selector, surfacing the selector text in the error.
pub(crate) fn selector(source: &str) -> Result<Selector> {
    Selector::parse(source).map_err(|e| anyhow!("invalid selector '{source}': {e}"))
}

/// Resolve a possibly relative href against the page it appeared on.
pub(crate) fn resolve_url(page_url: &str, href: &str) -> ParseResult<String> {
    let base = url::Url::parse(page_url).map_err(|_| ParseError::MalformedValue {
        field: "page_url",
        value: page_url.to_string(),
    })?;
    let resolved = base.join(href).map_err(|_| ParseError::MalformedValue {
        field: "href",
        value: href.to_string(),
    })?;
    Ok(resolved.to_string())
}

/// Collapse runs of whitespace, trimming the ends.
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
