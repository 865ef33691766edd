//! API extractor - offset pagination over a JSON product endpoint
//!
//! Walks `?limit=N&skip=M` pages until the product cap is reached or the
//! source runs out. A page failure after retry exhaustion truncates the
//! extraction (partial success) unless it is the very first page, which is
//! treated as an unreachable source and surfaced as a fatal error.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::RawApiRecord;
use crate::infrastructure::http_client::FetchClient;

/// Wire shape of one API page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ApiPage {
    products: Vec<RawApiRecord>,
    total: u64,
    #[allow(dead_code)]
    skip: u64,
    #[allow(dead_code)]
    limit: u64,
}

/// Result of one API extraction pass.
#[derive(Debug)]
pub struct ApiExtraction {
    pub records: Vec<RawApiRecord>,
    pub pages_fetched: u32,
    /// True when a page failure cut the walk short of the cap.
    pub truncated: bool,
}

pub struct ApiExtractor {
    client: FetchClient,
    base_url: String,
    page_limit: u64,
}

impl ApiExtractor {
    pub fn new(client: FetchClient, base_url: impl Into<String>, page_limit: u64) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            page_limit: page_limit.max(1),
        }
    }

    fn page_url(&self, skip: u64) -> String {
        format!(
            "{}/products?limit={}&skip={}",
            self.base_url.trim_end_matches('/'),
            self.page_limit,
            skip
        )
    }

    /// Collect up to `max_products` raw records.
    pub async fn extract(&self, max_products: usize) -> Result<ApiExtraction> {
        info!(max_products, "starting API extraction");

        let mut records: Vec<RawApiRecord> = Vec::new();
        let mut pages_fetched = 0u32;
        let mut truncated = false;
        let mut skip = 0u64;

        // The cap is checked before each new page request.
        while records.len() < max_products {
            let url = self.page_url(skip);

            let payload = match self.client.fetch(&url).await {
                Ok(payload) => payload,
                Err(e) if pages_fetched == 0 => {
                    return Err(e).context("API source unreachable on first request");
                }
                Err(e) => {
                    warn!(url, error = %e, "page fetch failed, truncating API extraction");
                    truncated = true;
                    break;
                }
            };

            let page: ApiPage = match payload.json() {
                Ok(page) => page,
                Err(e) if pages_fetched == 0 => {
                    return Err(e).context("API source returned malformed JSON on first page");
                }
                Err(e) => {
                    warn!(url, error = %e, "malformed page, truncating API extraction");
                    truncated = true;
                    break;
                }
            };

            pages_fetched += 1;
            let page_len = page.products.len();
            if page_len == 0 {
                info!("no more products available");
                break;
            }

            records.extend(page.products);
            info!(
                collected = records.len().min(max_products),
                total = page.total,
                "API page processed"
            );

            if records.len() >= max_products {
                records.truncate(max_products);
                break;
            }
            // A short page means the source is exhausted.
            if (page_len as u64) < self.page_limit {
                break;
            }
            skip += self.page_limit;
            if page.total > 0 && skip >= page.total {
                break;
            }
        }

        info!(
            records = records.len(),
            pages_fetched, truncated, "API extraction finished"
        );

        Ok(ApiExtraction {
            records,
            pages_fetched,
            truncated,
        })
    }
}
