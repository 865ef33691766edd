//! ecom-harvest - Dual-source e-commerce product extraction pipeline
//!
//! Collects product records from a paginated JSON API and a crawlable
//! listing/detail web site, unifies both into one canonical schema, and
//! produces a deduplicated, quality-validated dataset with run statistics.

pub mod domain;
pub mod extractor;
pub mod infrastructure;
pub mod pipeline;
