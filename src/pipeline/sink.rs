//! Output sink
//!
//! Writes the final dataset as timestamped JSON and CSV files plus a
//! statistics report. The sink only serializes; it never mutates records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::{CanonicalRecord, Statistics};
use crate::infrastructure::config::OutputConfig;
use crate::pipeline::quality::Dataset;

/// Paths produced by one sink pass.
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub statistics: Option<PathBuf>,
}

pub struct Sink {
    output_dir: PathBuf,
    write_json: bool,
    write_csv: bool,
}

impl Sink {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            write_json: config.write_json,
            write_csv: config.write_csv,
        }
    }

    /// Write the dataset and statistics, stamping file names with the run
    /// start time.
    pub async fn write(
        &self,
        dataset: &Dataset,
        statistics: &Statistics,
        started_at: DateTime<Utc>,
    ) -> Result<WrittenFiles> {
        fs::create_dir_all(&self.output_dir).await.with_context(|| {
            format!("failed to create output dir: {}", self.output_dir.display())
        })?;

        let stamp = started_at.format("%Y%m%d_%H%M%S");
        let mut written = WrittenFiles::default();

        if self.write_json {
            let path = self.output_dir.join(format!("products_{stamp}.json"));
            let body = serde_json::to_string_pretty(&dataset.records)?;
            write_file(&path, &body).await?;
            written.json = Some(path);
        }

        if self.write_csv {
            let path = self.output_dir.join(format!("products_{stamp}.csv"));
            write_file(&path, &to_csv(&dataset.records)).await?;
            written.csv = Some(path);
        }

        let stats_path = self.output_dir.join(format!("statistics_{stamp}.json"));
        let body = serde_json::to_string_pretty(statistics)?;
        write_file(&stats_path, &body).await?;
        written.statistics = Some(stats_path);

        info!(dir = %self.output_dir.display(), records = dataset.records.len(), "dataset written");
        Ok(written)
    }
}

async fn write_file(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

const CSV_HEADER: &str = "id,title,price,original_price,discount_percentage,category,rating,\
rating_category,price_category,in_stock,has_description,title_length,data_source,scraped_at,\
source_url";

fn to_csv(records: &[CanonicalRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 96 + CSV_HEADER.len());
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        push_row(&mut out, record);
    }
    out
}

fn push_row(out: &mut String, record: &CanonicalRecord) {
    let fields: [String; 15] = [
        record.id.clone(),
        record.title.clone(),
        opt_num(record.price),
        opt_num(record.original_price),
        opt_num(record.discount_percentage),
        record.category.clone().unwrap_or_default(),
        opt_num(record.rating),
        record
            .rating_category
            .map(|c| c.as_str().to_string())
            .unwrap_or_default(),
        record
            .price_category
            .map(|c| c.as_str().to_string())
            .unwrap_or_default(),
        record.in_stock.to_string(),
        record
            .has_description
            .map(|b| b.to_string())
            .unwrap_or_default(),
        record
            .title_length
            .map(|n| n.to_string())
            .unwrap_or_default(),
        record.data_source.to_string(),
        record.scraped_at.to_rfc3339(),
        record.source_url.clone().unwrap_or_default(),
    ];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_escaped(out, field);
    }
    out.push('\n');
}

fn opt_num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quote a field when it contains a separator, quote or newline; embedded
/// quotes double up.
fn push_escaped(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}
