//! Run statistics and the partial-failure summary handed to the sink.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price distribution over the final dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Dataset-level statistics computed by the quality engine.
///
/// `completeness_ratio` is `1 - missing_cells / total_cells` over the four
/// tracked nullable cells per record (price, rating, description, category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total_records: usize,
    pub source_counts: BTreeMap<String, usize>,
    pub category_counts: BTreeMap<String, usize>,
    pub price: Option<PriceStats>,
    pub rating_counts: BTreeMap<String, usize>,
    pub in_stock_count: usize,
    pub out_of_stock_count: usize,
    pub missing_cells: usize,
    pub total_cells: usize,
    pub completeness_ratio: f64,
    pub rejected_records: usize,
    pub duplicates_removed: usize,
}

/// Counts of truncated/partial/rejected work for one pipeline run.
///
/// The success unit for `request_success_rate` is the individual HTTP
/// request, not the item; the rate is reported as-is and never compared
/// against a threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub api_records: usize,
    pub web_records: usize,
    pub total_records: usize,
    pub api_pages_fetched: u32,
    pub web_pages_visited: u32,
    pub api_truncated: bool,
    pub web_truncated: bool,
    pub partial_items: usize,
    pub rejected_records: usize,
    pub duplicates_removed: usize,
    pub requests_attempted: u64,
    pub requests_succeeded: u64,
    pub request_success_rate: f64,
    pub duration_ms: u64,
}

impl RunSummary {
    /// True when the run completed but some work was truncated, downgraded
    /// or rejected. The CLI layer maps this to a warning status.
    pub fn has_warnings(&self) -> bool {
        self.api_truncated
            || self.web_truncated
            || self.partial_items > 0
            || self.rejected_records > 0
    }
}
