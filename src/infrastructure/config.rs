//! Configuration infrastructure
//!
//! Loads and validates the JSON configuration file that drives a run.
//! Invalid caps or base URLs are the only fatal error class of the
//! pipeline; everything downstream degrades to partial success instead.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use url::Url;

/// Fetch discipline shared by both extractors.
///
/// Delays are uniform random per request; backoff is capped exponential
/// per retry attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Identity pool rotated across outbound requests (user-agent strings).
    pub identities: Vec<String>,
    /// Lower bound of the pre-request delay in milliseconds.
    pub delay_min_ms: u64,
    /// Upper bound of the pre-request delay in milliseconds.
    pub delay_max_ms: u64,
    /// Retry budget per request, on top of the initial attempt.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds; doubles per retry.
    pub backoff_base_ms: u64,
    /// Cap applied to the computed backoff delay.
    pub backoff_max_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            identities: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string(),
            ],
            delay_min_ms: 1_000,
            delay_max_ms: 3_000,
            max_retries: 3,
            backoff_base_ms: 2_000,
            backoff_max_ms: 60_000,
            timeout_seconds: 30,
        }
    }
}

/// Settings for the offset-paginated API source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSourceConfig {
    pub base_url: String,
    /// Page size requested via the `limit` query parameter.
    pub page_limit: u64,
    pub max_products: usize,
}

impl Default for ApiSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dummyjson.com".to_string(),
            page_limit: 100,
            max_products: 100,
        }
    }
}

/// Settings for the link-following web source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSourceConfig {
    pub base_url: String,
    pub max_products: usize,
    /// Listing-page budget; `None` means unlimited.
    pub max_pages: Option<u32>,
    /// Best-effort product image download.
    pub download_images: bool,
    pub images_dir: PathBuf,
}

impl Default for WebSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://books.toscrape.com".to_string(),
            max_products: 100,
            max_pages: None,
            download_images: false,
            images_dir: PathBuf::from("data/images"),
        }
    }
}

/// Where the sink writes the dataset and statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub write_json: bool,
    pub write_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/processed"),
            write_json: true,
            write_csv: true,
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Also write logs to a daily-rolled file under `log_dir`.
    pub file_output: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_output: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSourceConfig,
    pub web: WebSourceConfig,
    pub fetch: FetchPolicy,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate caps and base URLs before any request is issued.
    pub fn validate(&self) -> Result<()> {
        if self.api.page_limit == 0 {
            bail!("api.page_limit must be greater than zero");
        }
        if self.web.max_pages == Some(0) {
            bail!("web.max_pages must be greater than zero when set");
        }
        if self.fetch.delay_min_ms > self.fetch.delay_max_ms {
            bail!(
                "fetch.delay_min_ms ({}) exceeds fetch.delay_max_ms ({})",
                self.fetch.delay_min_ms,
                self.fetch.delay_max_ms
            );
        }
        if self.fetch.identities.is_empty() {
            bail!("fetch.identities must contain at least one identity");
        }
        Url::parse(&self.api.base_url)
            .with_context(|| format!("invalid api.base_url: {}", self.api.base_url))?;
        Url::parse(&self.web.base_url)
            .with_context(|| format!("invalid web.base_url: {}", self.web.base_url))?;
        Ok(())
    }
}

/// Loads the configuration file, creating it with defaults on first run.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config file, writing the defaults first if it is missing.
    pub async fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            let config = AppConfig::default();
            self.save(&config).await?;
            info!(path = %self.config_path.display(), "initialized default configuration");
            return Ok(config);
        }

        let contents = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("failed to read config: {}", self.config_path.display()))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", self.config_path.display()))?;
        Ok(config)
    }

    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("failed to create config dir: {}", parent.display())
                })?;
            }
        }
        let contents = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)
            .await
            .with_context(|| format!("failed to write config: {}", self.config_path.display()))?;
        Ok(())
    }
}
