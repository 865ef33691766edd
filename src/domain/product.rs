//! Product record types for both sources and the unified canonical schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which extractor produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSource {
    Api,
    Web,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Web => "WEB",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product as returned by the JSON API, loosely typed.
///
/// Every field is optional; the normalizer decides what a missing or
/// malformed value degrades to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawApiRecord {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub stock: Option<i64>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub thumbnail: Option<String>,
}

/// Per-item progress through the two-phase web extraction.
///
/// `Discovered` items carry listing fields only; a detail fetch promotes
/// them to `DetailFetched` or downgrades them to `DetailFailed` without
/// affecting any other item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailState {
    Discovered,
    DetailFetched,
    DetailFailed,
}

/// One product scraped from the web source.
///
/// Built in two phases: the listing pass seeds title/price/rating, the
/// detail-page fetch fills in the rest. `detail_state` records how far an
/// item got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWebRecord {
    pub title: String,
    pub product_url: String,
    pub price_text: Option<String>,
    pub rating_token: Option<String>,
    pub availability_text: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub review_count: Option<u32>,
    pub detail_state: DetailState,
}

/// Source-tagged raw record, the normalizer's single input type.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Api(RawApiRecord),
    Web(RawWebRecord),
}

impl RawRecord {
    pub fn source(&self) -> DataSource {
        match self {
            Self::Api(_) => DataSource::Api,
            Self::Web(_) => DataSource::Web,
        }
    }
}

/// Data-quality annotations attached during normalization and enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    MalformedPrice,
    MalformedRating,
    MissingRating,
    UnrecognizedAvailability,
    UnknownStock,
    ImputedCategory,
    PartialDetail,
}

/// Price band derived from fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceCategory {
    Budget,
    Standard,
    Premium,
}

impl PriceCategory {
    /// <20 budget, <100 standard, else premium.
    pub fn classify(price: f64) -> Self {
        if price < 20.0 {
            Self::Budget
        } else if price < 100.0 {
            Self::Standard
        } else {
            Self::Premium
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }
}

/// Rating band over fixed bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingCategory {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl RatingCategory {
    /// Bins: [0,2] poor, (2,3] fair, (3,4] good, (4,5] excellent.
    pub fn classify(rating: f64) -> Option<Self> {
        if !(0.0..=5.0).contains(&rating) {
            return None;
        }
        Some(if rating <= 2.0 {
            Self::Poor
        } else if rating <= 3.0 {
            Self::Fair
        } else if rating <= 4.0 {
            Self::Good
        } else {
            Self::Excellent
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// The unified product schema, regardless of origin.
///
/// `price_category`, `rating_category`, `discount_percentage`,
/// `title_length` and `has_description` are derived fields filled in by the
/// quality engine; they stay `None` on freshly normalized records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub title: String,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub in_stock: bool,
    pub description: Option<String>,
    pub data_source: DataSource,
    pub scraped_at: DateTime<Utc>,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub price_category: Option<PriceCategory>,
    pub rating_category: Option<RatingCategory>,
    pub discount_percentage: Option<f64>,
    pub title_length: Option<usize>,
    pub has_description: Option<bool>,
    pub quality_flags: Vec<QualityFlag>,
}

impl CanonicalRecord {
    /// Number of populated cells among the tracked nullable fields.
    /// Used by dedup to pick the most complete variant.
    pub fn completeness(&self) -> usize {
        self.tracked_cells() - self.missing_cells()
    }

    /// Number of tracked nullable fields per record.
    pub fn tracked_cells(&self) -> usize {
        4
    }

    /// Missing cells among {price, rating, description, category}.
    /// The imputed "unknown" category sentinel counts as missing.
    pub fn missing_cells(&self) -> usize {
        let mut missing = 0;
        if self.price.is_none() {
            missing += 1;
        }
        if self.rating.is_none() {
            missing += 1;
        }
        if self.description.is_none() {
            missing += 1;
        }
        if self.category.as_deref().map_or(true, |c| c == "unknown") {
            missing += 1;
        }
        missing
    }

    pub fn flag(&mut self, flag: QualityFlag) {
        if !self.quality_flags.contains(&flag) {
            self.quality_flags.push(flag);
        }
    }
}
