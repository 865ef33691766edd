//! Source extractors
//!
//! Each source owns its traversal state machine: the API extractor walks
//! offset pagination, the web extractor follows listing links and fetches
//! one detail page per discovered item. Both run sequentially within
//! themselves and may run concurrently with each other.

pub mod api;
pub mod parsing;
pub mod web;

pub use api::{ApiExtraction, ApiExtractor};
pub use web::{WebExtraction, WebExtractor};
