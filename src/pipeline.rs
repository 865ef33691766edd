//! Pipeline orchestration
//!
//! Runs the enabled extractors concurrently over one shared identity pool
//! and request counter, normalizes the raw records, and hands them to the
//! quality engine. The result carries the dataset, its statistics, and a
//! run summary the CLI maps to an exit status.

pub mod normalizer;
pub mod quality;
pub mod sink;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::domain::{RawRecord, RunSummary, Statistics};
use crate::extractor::api::{ApiExtraction, ApiExtractor};
use crate::extractor::web::{WebExtraction, WebExtractor};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::{
    FetchClient, IdentityPool, ReqwestTransport, RequestCounters, Transport,
};
use quality::Dataset;

/// Which sources a run executes.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub run_api: bool,
    pub run_web: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_api: true,
            run_web: true,
        }
    }
}

/// Everything one pipeline run produces.
#[derive(Debug)]
pub struct PipelineRun {
    pub dataset: Dataset,
    pub statistics: Statistics,
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
}

/// Execute one full extraction run against the configured sources.
///
/// Fatal errors are confined to configuration problems and a source being
/// unreachable on its very first request; anything later degrades to a
/// truncated or partial dataset reported through the summary.
pub async fn run_pipeline(config: &AppConfig, options: RunOptions) -> Result<PipelineRun> {
    let transport = Arc::new(ReqwestTransport::new(config.fetch.timeout_seconds)?);
    run_pipeline_with_transport(config, options, transport).await
}

/// [`run_pipeline`] over an injected transport. Lets tests script the wire
/// while exercising the real extraction, normalization and quality path.
pub async fn run_pipeline_with_transport(
    config: &AppConfig,
    options: RunOptions,
    transport: Arc<dyn Transport>,
) -> Result<PipelineRun> {
    config.validate().context("invalid configuration")?;

    let started_at = Utc::now();
    let clock = Instant::now();

    let identities = Arc::new(IdentityPool::new(config.fetch.identities.clone()));
    let counters = Arc::new(RequestCounters::default());
    let client = FetchClient::new(config.fetch.clone(), transport)
        .with_identity_pool(identities)
        .with_counters(Arc::clone(&counters));

    let api_extractor = options
        .run_api
        .then(|| ApiExtractor::new(client.clone(), &config.api.base_url, config.api.page_limit));
    let web_extractor = options
        .run_web
        .then(|| WebExtractor::new(client.clone(), &config.web))
        .transpose()?;

    let (api, web) = tokio::join!(
        run_api_source(api_extractor, config.api.max_products),
        run_web_source(web_extractor, config.web.max_products, config.web.max_pages),
    );
    let api = api?;
    let web = web?;

    let scraped_at = Utc::now();
    let mut raw: Vec<RawRecord> = Vec::with_capacity(api.records.len() + web.records.len());
    raw.extend(api.records.iter().cloned().map(RawRecord::Api));
    raw.extend(web.records.iter().cloned().map(RawRecord::Web));

    let canonical: Vec<_> = raw
        .into_iter()
        .map(|record| normalizer::normalize(record, scraped_at))
        .collect();
    let (dataset, statistics) = quality::build(canonical);

    let (requests_attempted, requests_succeeded) = counters.snapshot();
    let summary = RunSummary {
        api_records: api.records.len(),
        web_records: web.records.len(),
        total_records: dataset.records.len(),
        api_pages_fetched: api.pages_fetched,
        web_pages_visited: web.pages_visited,
        api_truncated: api.truncated,
        web_truncated: web.truncated,
        partial_items: web.partial_items,
        rejected_records: statistics.rejected_records,
        duplicates_removed: statistics.duplicates_removed,
        requests_attempted,
        requests_succeeded,
        request_success_rate: if requests_attempted == 0 {
            1.0
        } else {
            requests_succeeded as f64 / requests_attempted as f64
        },
        duration_ms: clock.elapsed().as_millis() as u64,
    };

    info!(
        total_records = summary.total_records,
        duration_ms = summary.duration_ms,
        success_rate = summary.request_success_rate,
        "pipeline run complete"
    );

    Ok(PipelineRun {
        dataset,
        statistics,
        summary,
        started_at,
    })
}

async fn run_api_source(
    extractor: Option<ApiExtractor>,
    max_products: usize,
) -> Result<ApiExtraction> {
    match extractor {
        Some(extractor) => extractor.extract(max_products).await,
        None => Ok(ApiExtraction {
            records: Vec::new(),
            pages_fetched: 0,
            truncated: false,
        }),
    }
}

async fn run_web_source(
    extractor: Option<WebExtractor>,
    max_products: usize,
    max_pages: Option<u32>,
) -> Result<WebExtraction> {
    match extractor {
        Some(extractor) => extractor.extract(max_products, max_pages).await,
        None => Ok(WebExtraction {
            records: Vec::new(),
            pages_visited: 0,
            truncated: false,
            partial_items: 0,
        }),
    }
}
