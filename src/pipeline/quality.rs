//! Merge and quality engine
//!
//! Purely functional over the in-memory collection: rejects unusable
//! records, collapses duplicates, fills derived fields, and computes
//! dataset statistics. Deterministic given identical input.

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{
    CanonicalRecord, DataSource, PriceCategory, PriceStats, QualityFlag, RatingCategory,
    Statistics,
};

/// The merged, deduplicated, enriched output collection.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub records: Vec<CanonicalRecord>,
}

/// Run the full quality pass: reject, dedup, enrich, measure.
pub fn build(records: Vec<CanonicalRecord>) -> (Dataset, Statistics) {
    let before = records.len();

    let (kept, rejected) = reject_unusable(records);
    let (merged, duplicates_removed) = dedup(kept);
    let enriched: Vec<CanonicalRecord> = merged.into_iter().map(enrich).collect();

    info!(
        input = before,
        output = enriched.len(),
        rejected, duplicates_removed, "quality pass complete"
    );

    let statistics = compute_statistics(&enriched, rejected, duplicates_removed);
    (Dataset { records: enriched }, statistics)
}

/// A record without a title or any usable price carries too little to
/// merge; drop it and count the rejection.
fn reject_unusable(records: Vec<CanonicalRecord>) -> (Vec<CanonicalRecord>, usize) {
    let before = records.len();
    let kept: Vec<CanonicalRecord> = records
        .into_iter()
        .filter(|r| {
            let usable = !r.title.is_empty() && r.price.is_some();
            if !usable {
                debug!(id = %r.id, "rejecting unusable record");
            }
            usable
        })
        .collect();
    let rejected = before - kept.len();
    (kept, rejected)
}

/// Collapse records sharing (data_source, id), keeping the most complete
/// variant; ties go to the latest scraped_at. First-seen order of the
/// surviving keys is preserved.
fn dedup(records: Vec<CanonicalRecord>) -> (Vec<CanonicalRecord>, usize) {
    let before = records.len();
    let mut order: Vec<(DataSource, String)> = Vec::new();
    let mut best: HashMap<(DataSource, String), CanonicalRecord> = HashMap::new();

    for record in records {
        let key = (record.data_source, record.id.clone());
        match best.get_mut(&key) {
            None => {
                order.push(key.clone());
                best.insert(key, record);
            }
            Some(existing) => {
                if prefers(&record, existing) {
                    *existing = record;
                }
            }
        }
    }

    let merged: Vec<CanonicalRecord> = order
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect();
    let removed = before - merged.len();
    (merged, removed)
}

fn prefers(candidate: &CanonicalRecord, incumbent: &CanonicalRecord) -> bool {
    let c = candidate.missing_cells();
    let i = incumbent.missing_cells();
    c < i || (c == i && candidate.scraped_at > incumbent.scraped_at)
}

/// Fill the derived fields and impute the category sentinel.
fn enrich(mut record: CanonicalRecord) -> CanonicalRecord {
    if record.category.is_none() {
        record.category = Some("unknown".to_string());
        record.flag(QualityFlag::ImputedCategory);
    }
    if record.rating.is_none() {
        record.flag(QualityFlag::MissingRating);
    }

    record.price_category = record.price.map(PriceCategory::classify);
    record.rating_category = record.rating.and_then(RatingCategory::classify);
    record.title_length = Some(record.title.chars().count());
    record.has_description = Some(record.description.is_some());

    record.discount_percentage = match (record.original_price, record.price) {
        (Some(original), Some(price)) if original > price && original > 0.0 => {
            Some(((1.0 - price / original) * 100.0 * 100.0).round() / 100.0)
        }
        _ => None,
    };

    record
}

/// Dataset statistics over any record slice. The quality pass feeds it the
/// enriched dataset; tests may feed it arbitrary collections.
pub fn compute_statistics(
    records: &[CanonicalRecord],
    rejected_records: usize,
    duplicates_removed: usize,
) -> Statistics {
    let mut source_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut rating_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut prices: Vec<f64> = Vec::new();
    let mut in_stock_count = 0;
    let mut missing_cells = 0;

    for record in records {
        *source_counts
            .entry(record.data_source.as_str().to_string())
            .or_default() += 1;
        if let Some(category) = &record.category {
            *category_counts.entry(category.clone()).or_default() += 1;
        }
        if let Some(band) = record.rating.and_then(RatingCategory::classify) {
            *rating_counts.entry(band.as_str().to_string()).or_default() += 1;
        }
        if let Some(price) = record.price {
            prices.push(price);
        }
        if record.in_stock {
            in_stock_count += 1;
        }
        missing_cells += record.missing_cells();
    }

    let total_cells = records
        .iter()
        .map(CanonicalRecord::tracked_cells)
        .sum::<usize>();
    let completeness_ratio = if total_cells == 0 {
        1.0
    } else {
        1.0 - missing_cells as f64 / total_cells as f64
    };

    Statistics {
        total_records: records.len(),
        source_counts,
        category_counts,
        price: price_stats(&mut prices),
        rating_counts,
        in_stock_count,
        out_of_stock_count: records.len() - in_stock_count,
        missing_cells,
        total_cells,
        completeness_ratio,
        rejected_records,
        duplicates_removed,
    }
}

fn price_stats(prices: &mut [f64]) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }
    prices.sort_by(|a, b| a.total_cmp(b));
    let n = prices.len();
    let median = if n % 2 == 1 {
        prices[n / 2]
    } else {
        (prices[n / 2 - 1] + prices[n / 2]) / 2.0
    };
    Some(PriceStats {
        mean: prices.iter().sum::<f64>() / n as f64,
        median,
        min: prices[0],
        max: prices[n - 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str, source: DataSource) -> CanonicalRecord {
        CanonicalRecord {
            id: id.to_string(),
            title: format!("Product {id}"),
            price: Some(25.0),
            original_price: Some(25.0),
            category: Some("fiction".to_string()),
            rating: Some(4.0),
            in_stock: true,
            description: Some("desc".to_string()),
            data_source: source,
            scraped_at: Utc::now(),
            source_url: None,
            image_url: None,
            price_category: None,
            rating_category: None,
            discount_percentage: None,
            title_length: None,
            has_description: None,
            quality_flags: Vec::new(),
        }
    }

    #[test]
    fn rejects_records_without_title_or_price() {
        let mut no_title = record("a", DataSource::Api);
        no_title.title = String::new();
        let mut no_price = record("b", DataSource::Api);
        no_price.price = None;
        let good = record("c", DataSource::Api);

        let (dataset, stats) = build(vec![no_title, no_price, good]);

        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].id, "c");
        assert_eq!(stats.rejected_records, 2);
    }

    #[test]
    fn dedup_keeps_most_complete_variant() {
        let mut sparse = record("x", DataSource::Web);
        sparse.description = None;
        sparse.rating = None;
        let full = record("x", DataSource::Web);

        let (dataset, stats) = build(vec![sparse, full]);

        assert_eq!(dataset.records.len(), 1);
        assert!(dataset.records[0].description.is_some());
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn dedup_tie_breaks_on_latest_scrape() {
        let mut older = record("x", DataSource::Web);
        older.scraped_at = Utc::now() - Duration::hours(1);
        older.title = "Old Title".to_string();
        let mut newer = record("x", DataSource::Web);
        newer.title = "New Title".to_string();

        let (dataset, _) = build(vec![older, newer]);
        assert_eq!(dataset.records[0].title, "New Title");
    }

    #[test]
    fn same_id_across_sources_does_not_collapse() {
        let api = record("x", DataSource::Api);
        let web = record("x", DataSource::Web);

        let (dataset, stats) = build(vec![api, web]);
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(stats.duplicates_removed, 0);
    }

    #[test]
    fn enrichment_fills_derived_fields() {
        let mut input = record("x", DataSource::Api);
        input.price = Some(15.0);
        input.original_price = Some(20.0);
        input.rating = Some(4.5);
        input.category = None;

        let (dataset, _) = build(vec![input]);
        let out = &dataset.records[0];

        assert_eq!(out.price_category, Some(PriceCategory::Budget));
        assert_eq!(out.rating_category, Some(RatingCategory::Excellent));
        assert_eq!(out.title_length, Some("Product x".chars().count()));
        assert_eq!(out.has_description, Some(true));
        assert_eq!(out.discount_percentage, Some(25.0));
        assert_eq!(out.category.as_deref(), Some("unknown"));
        assert!(out.quality_flags.contains(&QualityFlag::ImputedCategory));
    }

    #[test]
    fn missing_rating_is_flagged_not_rejected() {
        let mut input = record("x", DataSource::Api);
        input.rating = None;

        let (dataset, _) = build(vec![input]);
        let out = &dataset.records[0];

        assert!(out.quality_flags.contains(&QualityFlag::MissingRating));
        assert!(out.rating_category.is_none());
    }

    #[test]
    fn statistics_cover_mixed_completeness() {
        // Prices 10, 20, missing, 40 over four records.
        let mut records: Vec<CanonicalRecord> = [10.0, 20.0, 40.0]
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut r = record(&format!("p{i}"), DataSource::Api);
                r.price = Some(*p);
                r
            })
            .collect();
        let mut gap = record("p3", DataSource::Web);
        gap.price = None;
        records.push(gap);

        let stats = compute_statistics(&records, 0, 0);

        assert_eq!(stats.total_records, 4);
        let price = stats.price.unwrap();
        assert!((price.mean - 70.0 / 3.0).abs() < 1e-9);
        assert_eq!(price.median, 20.0);
        assert_eq!(price.min, 10.0);
        assert_eq!(price.max, 40.0);

        // One missing cell out of 16 tracked cells.
        assert_eq!(stats.total_cells, 16);
        assert_eq!(stats.missing_cells, 1);
        assert!((stats.completeness_ratio - 15.0 / 16.0).abs() < 1e-9);
        assert_eq!(stats.source_counts.get("API"), Some(&3));
        assert_eq!(stats.source_counts.get("WEB"), Some(&1));
    }

    #[test]
    fn empty_dataset_has_no_price_stats() {
        let stats = compute_statistics(&[], 0, 0);
        assert!(stats.price.is_none());
        assert_eq!(stats.completeness_ratio, 1.0);
        assert_eq!(stats.out_of_stock_count, 0);
    }
}
