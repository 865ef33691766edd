use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use ecom_harvest::infrastructure::config::ConfigManager;
use ecom_harvest::infrastructure::logging::init_logging;
use ecom_harvest::pipeline::sink::Sink;
use ecom_harvest::pipeline::{RunOptions, run_pipeline};

/// Dual-source product harvester: pulls a JSON product API and a product
/// listing site into one deduplicated, quality-annotated dataset.
#[derive(Parser, Debug)]
#[command(name = "ecom-harvest", version, about)]
struct Cli {
    /// Configuration file, created with defaults when missing.
    #[arg(short, long, default_value = "config/harvest.json")]
    config: PathBuf,

    /// Cap on products pulled from the API source.
    #[arg(long)]
    api_products: Option<usize>,

    /// Cap on products scraped from the web source.
    #[arg(long)]
    web_products: Option<usize>,

    /// Cap on listing pages visited by the web source.
    #[arg(long)]
    web_pages: Option<u32>,

    /// Run only the API source.
    #[arg(long, conflicts_with = "web_only")]
    api_only: bool,

    /// Run only the web source.
    #[arg(long, conflicts_with = "api_only")]
    web_only: bool,

    /// Download product images alongside the dataset.
    #[arg(long)]
    download_images: bool,

    /// Override the output directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::new(&cli.config);
    let mut config = manager.load().await?;

    if let Some(cap) = cli.api_products {
        config.api.max_products = cap;
    }
    if let Some(cap) = cli.web_products {
        config.web.max_products = cap;
    }
    if let Some(cap) = cli.web_pages {
        config.web.max_pages = Some(cap);
    }
    if cli.download_images {
        config.web.download_images = true;
    }
    if let Some(dir) = cli.output_dir {
        config.output.output_dir = dir;
    }

    init_logging(&config.logging)?;
    info!(config = %manager.path().display(), "starting harvest run");

    let options = RunOptions {
        run_api: !cli.web_only,
        run_web: !cli.api_only,
    };

    let run = run_pipeline(&config, options).await?;

    let written = Sink::new(&config.output)
        .write(&run.dataset, &run.statistics, run.started_at)
        .await?;
    if let Some(path) = &written.json {
        info!(path = %path.display(), "dataset JSON written");
    }
    if let Some(path) = &written.csv {
        info!(path = %path.display(), "dataset CSV written");
    }
    if let Some(path) = &written.statistics {
        info!(path = %path.display(), "statistics written");
    }

    let summary = &run.summary;
    info!(
        api_records = summary.api_records,
        web_records = summary.web_records,
        total_records = summary.total_records,
        duplicates_removed = summary.duplicates_removed,
        request_success_rate = summary.request_success_rate,
        duration_ms = summary.duration_ms,
        "run finished"
    );

    // Partial success still exits zero; the warnings carry the detail.
    if summary.has_warnings() {
        if summary.api_truncated {
            warn!(
                pages_fetched = summary.api_pages_fetched,
                "API extraction was truncated"
            );
        }
        if summary.web_truncated {
            warn!(
                pages_visited = summary.web_pages_visited,
                "web extraction was truncated"
            );
        }
        if summary.partial_items > 0 {
            warn!(
                partial_items = summary.partial_items,
                "some items are missing detail fields"
            );
        }
        if summary.rejected_records > 0 {
            warn!(
                rejected = summary.rejected_records,
                "some records were rejected during the quality pass"
            );
        }
    }

    Ok(())
}
