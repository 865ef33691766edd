//! Web extractor - listing walk plus per-item detail fetch
//!
//! Phase one follows next-page links over listing pages and seeds one
//! record per discovered product. Phase two fetches each item's detail
//! page; a detail failure downgrades only that item to a partial record.
//! Image download, when enabled, is best-effort and never fails an item.

use anyhow::{Context, Result, anyhow};
use scraper::Html;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::domain::{DetailState, RawWebRecord};
use crate::extractor::parsing::{DetailPage, DetailParser, ListingEntry, ListingParser};
use crate::infrastructure::config::WebSourceConfig;
use crate::infrastructure::http_client::FetchClient;

/// Result of one web extraction pass.
#[derive(Debug)]
pub struct WebExtraction {
    pub records: Vec<RawWebRecord>,
    pub pages_visited: u32,
    /// True when a listing-page failure cut the walk short.
    pub truncated: bool,
    /// Items downgraded to partial by a detail-page failure.
    pub partial_items: usize,
}

pub struct WebExtractor {
    client: FetchClient,
    start_url: String,
    list_parser: ListingParser,
    detail_parser: DetailParser,
    download_images: bool,
    images_dir: PathBuf,
}

impl WebExtractor {
    pub fn new(client: FetchClient, config: &WebSourceConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            start_url: format!("{base}/catalogue/page-1.html"),
            list_parser: ListingParser::new()?,
            detail_parser: DetailParser::new()?,
            download_images: config.download_images,
            images_dir: config.images_dir.clone(),
        })
    }

    /// Collect up to `max_products` raw records across at most `max_pages`
    /// listing pages.
    pub async fn extract(
        &self,
        max_products: usize,
        max_pages: Option<u32>,
    ) -> Result<WebExtraction> {
        info!(max_products, ?max_pages, "starting web extraction");

        let (seeds, pages_visited, truncated) = self.walk_listings(max_products, max_pages).await?;

        let mut records = Vec::with_capacity(seeds.len());
        let mut partial_items = 0usize;

        for seed in seeds {
            // The product budget is re-checked before each detail request.
            if records.len() >= max_products {
                break;
            }
            let mut record = seed_record(&seed);

            match self.fetch_detail(&seed.detail_url).await {
                Ok(detail) => {
                    apply_detail(&mut record, detail);
                    record.detail_state = DetailState::DetailFetched;
                    if self.download_images {
                        if let Some(image_url) = record.image_url.clone() {
                            self.download_image(&image_url).await;
                        }
                    }
                }
                Err(e) => {
                    // Keep listing-derived fields; only this item degrades.
                    warn!(url = %seed.detail_url, error = %e, "detail fetch failed, keeping partial item");
                    record.detail_state = DetailState::DetailFailed;
                    partial_items += 1;
                }
            }

            records.push(record);
        }

        info!(
            records = records.len(),
            pages_visited, truncated, partial_items, "web extraction finished"
        );

        Ok(WebExtraction {
            records,
            pages_visited,
            truncated,
            partial_items,
        })
    }

    /// Listing phase: gather detail links until a budget runs out or the
    /// pager ends. The first page failing is fatal; later failures
    /// truncate the walk.
    async fn walk_listings(
        &self,
        max_products: usize,
        max_pages: Option<u32>,
    ) -> Result<(Vec<ListingEntry>, u32, bool)> {
        let mut seeds: Vec<ListingEntry> = Vec::new();
        let mut pages_visited = 0u32;
        let mut truncated = false;
        let mut current_url = self.start_url.clone();

        loop {
            if seeds.len() >= max_products {
                break;
            }
            if let Some(cap) = max_pages {
                if pages_visited >= cap {
                    info!(cap, "reached listing page budget");
                    break;
                }
            }

            let payload = match self.client.fetch(&current_url).await {
                Ok(payload) => payload,
                Err(e) if pages_visited == 0 => {
                    return Err(e).context("web source unreachable on first request");
                }
                Err(e) => {
                    warn!(url = %current_url, error = %e, "listing fetch failed, truncating walk");
                    truncated = true;
                    break;
                }
            };
            pages_visited += 1;

            let html = Html::parse_document(&payload.text());
            let page = match self.list_parser.parse(&html, &current_url) {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %current_url, error = %e, "listing parse failed, truncating walk");
                    truncated = true;
                    break;
                }
            };

            if page.entries.is_empty() {
                warn!(url = %current_url, "no product entries on listing page, stopping");
                break;
            }

            let remaining = max_products - seeds.len();
            seeds.extend(page.entries.into_iter().take(remaining));

            match page.next_url {
                Some(next) => current_url = next,
                None => break,
            }
        }

        debug!(seeds = seeds.len(), pages_visited, "listing walk complete");
        Ok((seeds, pages_visited, truncated))
    }

    async fn fetch_detail(&self, url: &str) -> Result<DetailPage> {
        let payload = self.client.fetch(url).await?;
        let html = Html::parse_document(&payload.text());
        self.detail_parser
            .parse(&html, url)
            .map_err(|e| anyhow!(e))
    }

    /// Best-effort image download; failures are logged and swallowed.
    async fn download_image(&self, image_url: &str) {
        let file_name = image_file_name(image_url);
        let target = self.images_dir.join(file_name);

        let payload = match self.client.fetch(image_url).await {
            Ok(payload) => payload,
            Err(e) => {
                debug!(image_url, error = %e, "image download failed");
                return;
            }
        };

        if let Err(e) = write_image(&target, payload.into_bytes()).await {
            debug!(image_url, error = %e, "image write failed");
        }
    }
}

fn seed_record(entry: &ListingEntry) -> RawWebRecord {
    RawWebRecord {
        title: entry.title.clone(),
        product_url: entry.detail_url.clone(),
        price_text: entry.price_text.clone(),
        rating_token: entry.rating_token.clone(),
        availability_text: entry.availability_text.clone(),
        description: None,
        category: None,
        image_url: None,
        review_count: None,
        detail_state: DetailState::Discovered,
    }
}

/// Merge detail-page attributes into a listing-seeded record, preferring
/// the detail page's value where both phases saw the field.
fn apply_detail(record: &mut RawWebRecord, detail: DetailPage) {
    if let Some(title) = detail.title {
        record.title = title;
    }
    if detail.price_text.is_some() {
        record.price_text = detail.price_text;
    }
    if detail.rating_token.is_some() {
        record.rating_token = detail.rating_token;
    }
    if detail.availability_text.is_some() {
        record.availability_text = detail.availability_text;
    }
    record.description = detail.description;
    record.category = detail.category;
    record.image_url = detail.image_url;
    record.review_count = detail.review_count;
}

fn image_file_name(image_url: &str) -> String {
    url::Url::parse(image_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}.img", blake3::hash(image_url.as_bytes()).to_hex()))
}

async fn write_image(target: &Path, bytes: Vec<u8>) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::FetchPolicy;
    use crate::infrastructure::http_client::{Transport, TransportError, TransportResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn quick_policy() -> FetchPolicy {
        FetchPolicy {
            delay_min_ms: 0,
            delay_max_ms: 0,
            max_retries: 0,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
            ..FetchPolicy::default()
        }
    }

    /// Serves canned pages by URL; unknown URLs 404, listed URLs can be
    /// forced to fail with a 500.
    struct SiteTransport {
        pages: HashMap<String, String>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl Transport for SiteTransport {
        async fn get(&self, url: &str, _id: &str) -> Result<TransportResponse, TransportError> {
            if self.failing.iter().any(|f| f == url) {
                return Ok(TransportResponse {
                    status: 500,
                    body: Vec::new(),
                });
            }
            match self.pages.get(url) {
                Some(body) => Ok(TransportResponse {
                    status: 200,
                    body: body.clone().into_bytes(),
                }),
                None => Ok(TransportResponse {
                    status: 404,
                    body: Vec::new(),
                }),
            }
        }
    }

    fn listing_page(base: &str, titles: &[&str], next: Option<&str>) -> String {
        let mut body = String::from("<html><body>");
        for title in titles {
            let slug = title.to_lowercase().replace(' ', "-");
            body.push_str(&format!(
                r#"<article class="product_pod">
                    <h3><a href="{base}/catalogue/{slug}/index.html" title="{title}">{title}</a></h3>
                    <p class="star-rating Four"></p>
                    <p class="price_color">£10.00</p>
                    <p class="instock availability">In stock</p>
                </article>"#
            ));
        }
        if let Some(next_href) = next {
            body.push_str(&format!(
                r#"<ul class="pager"><li class="next"><a href="{next_href}">next</a></li></ul>"#
            ));
        }
        body.push_str("</body></html>");
        body
    }

    fn detail_page(title: &str) -> String {
        format!(
            r#"<html><body>
            <ul class="breadcrumb">
              <li><a href="/">Home</a></li><li><a href="/b">Books</a></li>
              <li><a href="/b/fiction">Fiction</a></li>
            </ul>
            <div class="product_main">
              <h1>{title}</h1>
              <p class="price_color">£10.00</p>
              <p class="instock availability">In stock (5 available)</p>
              <p class="star-rating Four"></p>
            </div>
            <div id="product_description"><h2>Description</h2></div>
            <p>A fine description of {title}.</p>
            </body></html>"#
        )
    }

    fn site(titles_by_page: &[&[&str]], failing_details: &[&str]) -> SiteTransport {
        let base = "http://books.test";
        let mut pages = HashMap::new();
        let mut failing = Vec::new();

        for (i, titles) in titles_by_page.iter().enumerate() {
            let page_url = format!("{base}/catalogue/page-{}.html", i + 1);
            let next = (i + 1 < titles_by_page.len())
                .then(|| format!("{base}/catalogue/page-{}.html", i + 2));
            pages.insert(page_url, listing_page(base, titles, next.as_deref()));

            for title in *titles {
                let slug = title.to_lowercase().replace(' ', "-");
                let detail_url = format!("{base}/catalogue/{slug}/index.html");
                if failing_details.contains(title) {
                    failing.push(detail_url);
                } else {
                    pages.insert(detail_url, detail_page(title));
                }
            }
        }

        SiteTransport { pages, failing }
    }

    fn extractor(transport: SiteTransport) -> WebExtractor {
        let client = FetchClient::new(quick_policy(), Arc::new(transport));
        let config = WebSourceConfig {
            base_url: "http://books.test".to_string(),
            ..WebSourceConfig::default()
        };
        WebExtractor::new(client, &config).unwrap()
    }

    #[tokio::test]
    async fn walks_pages_and_fetches_details() {
        let transport = site(&[&["Book One", "Book Two"], &["Book Three"]], &[]);
        let extraction = extractor(transport).extract(10, None).await.unwrap();

        assert_eq!(extraction.records.len(), 3);
        assert_eq!(extraction.pages_visited, 2);
        assert_eq!(extraction.partial_items, 0);
        assert!(!extraction.truncated);
        assert!(
            extraction
                .records
                .iter()
                .all(|r| r.detail_state == DetailState::DetailFetched)
        );
        assert_eq!(extraction.records[0].category.as_deref(), Some("Fiction"));
        assert_eq!(extraction.records[0].availability_text.as_deref(),
            Some("In stock (5 available)"));
    }

    #[tokio::test]
    async fn respects_product_cap() {
        let transport = site(&[&["A", "B", "C"], &["D", "E"]], &[]);
        let extraction = extractor(transport).extract(2, None).await.unwrap();

        assert_eq!(extraction.records.len(), 2);
        // The cap is hit on the first page; the second is never fetched.
        assert_eq!(extraction.pages_visited, 1);
    }

    #[tokio::test]
    async fn respects_page_budget() {
        let transport = site(&[&["A", "B"], &["C", "D"], &["E"]], &[]);
        let extraction = extractor(transport).extract(100, Some(2)).await.unwrap();

        assert_eq!(extraction.pages_visited, 2);
        assert_eq!(extraction.records.len(), 4);
    }

    #[tokio::test]
    async fn detail_failure_downgrades_only_that_item() {
        let titles: Vec<String> = (1..=10).map(|i| format!("Book {i}")).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let transport = site(&[&refs], &["Book 5"]);
        let extraction = extractor(transport).extract(10, None).await.unwrap();

        assert_eq!(extraction.records.len(), 10);
        assert_eq!(extraction.partial_items, 1);

        for record in &extraction.records {
            if record.title == "Book 5" {
                assert_eq!(record.detail_state, DetailState::DetailFailed);
                assert!(record.description.is_none());
                assert!(record.category.is_none());
                // Listing-derived fields survive the downgrade.
                assert_eq!(record.price_text.as_deref(), Some("£10.00"));
            } else {
                assert_eq!(record.detail_state, DetailState::DetailFetched);
                assert!(record.description.is_some());
            }
        }
    }

    #[tokio::test]
    async fn first_listing_failure_is_fatal() {
        let transport = SiteTransport {
            pages: HashMap::new(),
            failing: vec!["http://books.test/catalogue/page-1.html".to_string()],
        };
        let result = extractor(transport).extract(10, None).await;
        assert!(result.is_err());
    }
}
