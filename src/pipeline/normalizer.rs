//! Record normalizer
//!
//! Maps loosely typed raw records from either source onto the canonical
//! schema. Malformed values degrade to `None` with a quality flag instead
//! of rejecting the record; rejection is the quality engine's call.

use chrono::{DateTime, Utc};

use crate::domain::{CanonicalRecord, QualityFlag, RawApiRecord, RawRecord, RawWebRecord};
use crate::domain::{DataSource, DetailState};

/// Normalize one raw record. Never fails; data problems surface as
/// quality flags on the output.
pub fn normalize(raw: RawRecord, scraped_at: DateTime<Utc>) -> CanonicalRecord {
    match raw {
        RawRecord::Api(record) => normalize_api(record, scraped_at),
        RawRecord::Web(record) => normalize_web(record, scraped_at),
    }
}

/// Normalizing a canonical record again is a no-op.
pub fn renormalize(record: CanonicalRecord) -> CanonicalRecord {
    record
}

fn normalize_api(record: RawApiRecord, scraped_at: DateTime<Utc>) -> CanonicalRecord {
    let mut out = CanonicalRecord {
        id: match record.id {
            Some(id) => format!("api-{id}"),
            None => synthesize_id("api", record.title.as_deref().unwrap_or_default()),
        },
        title: record
            .title
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
        price: None,
        original_price: None,
        category: record.category.as_deref().and_then(normalize_category),
        rating: None,
        in_stock: false,
        description: record
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        data_source: DataSource::Api,
        scraped_at,
        source_url: None,
        image_url: record.thumbnail,
        price_category: None,
        rating_category: None,
        discount_percentage: None,
        title_length: None,
        has_description: None,
        quality_flags: Vec::new(),
    };

    match record.price {
        Some(price) if price.is_finite() && price >= 0.0 => {
            out.price = Some(price);
            // Back out the pre-discount price when a discount is given.
            out.original_price = match record.discount_percentage {
                Some(d) if (0.0..100.0).contains(&d) && d > 0.0 => {
                    Some(price / (1.0 - d / 100.0))
                }
                _ => Some(price),
            };
        }
        Some(_) => out.flag(QualityFlag::MalformedPrice),
        None => {}
    }

    match record.rating {
        Some(rating) if (0.0..=5.0).contains(&rating) => out.rating = Some(rating),
        Some(_) => out.flag(QualityFlag::MalformedRating),
        None => {}
    }

    match record.stock {
        Some(stock) => out.in_stock = stock > 0,
        None => out.flag(QualityFlag::UnknownStock),
    }

    out
}

fn normalize_web(record: RawWebRecord, scraped_at: DateTime<Utc>) -> CanonicalRecord {
    let title = record.title.trim().to_string();
    let category = record.category.as_deref().and_then(normalize_category);
    let mut out = CanonicalRecord {
        // Stable across runs for the same item, with or without a source id.
        id: synthesize_id(
            "web",
            &format!("{title}|{}", category.as_deref().unwrap_or_default()),
        ),
        title,
        price: None,
        original_price: None,
        category,
        rating: None,
        in_stock: false,
        description: record.description.filter(|d| !d.trim().is_empty()),
        data_source: DataSource::Web,
        scraped_at,
        source_url: Some(record.product_url),
        image_url: record.image_url,
        price_category: None,
        rating_category: None,
        discount_percentage: None,
        title_length: None,
        has_description: None,
        quality_flags: Vec::new(),
    };

    match record.price_text.as_deref().map(parse_price) {
        Some(Some(price)) => {
            out.price = Some(price);
            out.original_price = Some(price);
        }
        Some(None) => out.flag(QualityFlag::MalformedPrice),
        None => {}
    }

    match record.rating_token.as_deref() {
        Some(token) => match star_rating(token) {
            Some(rating) => out.rating = Some(rating),
            None => out.flag(QualityFlag::MalformedRating),
        },
        None => {}
    }

    match record.availability_text.as_deref() {
        Some(text) => {
            let lower = text.to_lowercase();
            // "out of stock" contains "stock"; check it first.
            if lower.contains("out of stock") {
                out.in_stock = false;
            } else if lower.contains("in stock") {
                out.in_stock = true;
            } else {
                out.flag(QualityFlag::UnrecognizedAvailability);
            }
        }
        None => out.flag(QualityFlag::UnknownStock),
    }

    if record.detail_state == DetailState::DetailFailed {
        out.flag(QualityFlag::PartialDetail);
    }

    out
}

/// Stable identifier for records the source did not number.
fn synthesize_id(prefix: &str, seed: &str) -> String {
    let digest = blake3::hash(seed.as_bytes()).to_hex();
    format!("{prefix}-{}", &digest.as_str()[..16])
}

/// Parse a display price like `£51.77` or `$1,299.00`.
/// Negative or unparseable values are malformed.
fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|p| *p >= 0.0 && p.is_finite())
}

/// Map the word-encoded star class to a numeric rating.
fn star_rating(token: &str) -> Option<f64> {
    match token {
        "One" => Some(1.0),
        "Two" => Some(2.0),
        "Three" => Some(3.0),
        "Four" => Some(4.0),
        "Five" => Some(5.0),
        _ => None,
    }
}

/// Categories compare case-insensitively after trimming.
fn normalize_category(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn api_record() -> RawApiRecord {
        RawApiRecord {
            id: Some(7),
            title: Some("Wireless Mouse".to_string()),
            price: Some(24.99),
            discount_percentage: Some(20.0),
            category: Some(" Electronics ".to_string()),
            rating: Some(4.3),
            stock: Some(12),
            description: Some("A mouse.".to_string()),
            brand: None,
            thumbnail: None,
        }
    }

    fn web_record() -> RawWebRecord {
        RawWebRecord {
            title: "A Light in the Attic".to_string(),
            product_url: "https://books.example/catalogue/a_1000/index.html".to_string(),
            price_text: Some("£51.77".to_string()),
            rating_token: Some("Three".to_string()),
            availability_text: Some("In stock (22 available)".to_string()),
            description: Some("Poems.".to_string()),
            category: Some("Poetry".to_string()),
            image_url: None,
            review_count: Some(0),
            detail_state: DetailState::DetailFetched,
        }
    }

    #[test]
    fn api_record_maps_onto_canonical_schema() {
        let record = normalize(RawRecord::Api(api_record()), now());

        assert_eq!(record.id, "api-7");
        assert_eq!(record.title, "Wireless Mouse");
        assert_eq!(record.price, Some(24.99));
        assert_eq!(record.category.as_deref(), Some("electronics"));
        assert_eq!(record.rating, Some(4.3));
        assert!(record.in_stock);
        assert_eq!(record.data_source, DataSource::Api);
        assert!(record.quality_flags.is_empty());

        // 24.99 at 20% off backs out to 31.2375.
        let original = record.original_price.unwrap();
        assert!((original - 24.99 / 0.8).abs() < 1e-9);
    }

    #[test]
    fn web_record_maps_onto_canonical_schema() {
        let record = normalize(RawRecord::Web(web_record()), now());

        assert!(record.id.starts_with("web-"));
        assert_eq!(record.id.len(), "web-".len() + 16);
        assert_eq!(record.price, Some(51.77));
        assert_eq!(record.rating, Some(3.0));
        assert!(record.in_stock);
        assert_eq!(record.category.as_deref(), Some("poetry"));
        assert_eq!(
            record.source_url.as_deref(),
            Some("https://books.example/catalogue/a_1000/index.html")
        );
        assert!(record.quality_flags.is_empty());
    }

    #[test]
    fn synthesized_web_ids_are_stable_across_runs() {
        let a = normalize(RawRecord::Web(web_record()), now());
        let b = normalize(RawRecord::Web(web_record()), now());
        assert_eq!(a.id, b.id);

        let mut other = web_record();
        other.title = "A Different Book".to_string();
        let c = normalize(RawRecord::Web(other), now());
        assert_ne!(a.id, c.id);
    }

    #[rstest]
    #[case("£51.77", Some(51.77))]
    #[case("$1,299.00", Some(1299.0))]
    #[case("  €9.50 ", Some(9.5))]
    #[case("-5.00", None)]
    #[case("free", None)]
    fn price_parsing(#[case] text: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_price(text), expected);
    }

    #[test]
    fn malformed_price_degrades_with_flag() {
        let mut raw = web_record();
        raw.price_text = Some("free!".to_string());
        let record = normalize(RawRecord::Web(raw), now());

        assert_eq!(record.price, None);
        assert!(record.quality_flags.contains(&QualityFlag::MalformedPrice));
    }

    #[test]
    fn negative_api_price_is_malformed() {
        let mut raw = api_record();
        raw.price = Some(-3.0);
        let record = normalize(RawRecord::Api(raw), now());

        assert_eq!(record.price, None);
        assert!(record.quality_flags.contains(&QualityFlag::MalformedPrice));
    }

    #[rstest]
    #[case("In stock (22 available)", true, false)]
    #[case("Out of stock", false, false)]
    #[case("Ships in 2 weeks", false, true)]
    fn availability_mapping(#[case] text: &str, #[case] in_stock: bool, #[case] flagged: bool) {
        let mut raw = web_record();
        raw.availability_text = Some(text.to_string());
        let record = normalize(RawRecord::Web(raw), now());

        assert_eq!(record.in_stock, in_stock);
        assert_eq!(
            record
                .quality_flags
                .contains(&QualityFlag::UnrecognizedAvailability),
            flagged
        );
    }

    #[test]
    fn unknown_star_token_is_malformed_rating() {
        let mut raw = web_record();
        raw.rating_token = Some("Eleven".to_string());
        let record = normalize(RawRecord::Web(raw), now());

        assert_eq!(record.rating, None);
        assert!(record.quality_flags.contains(&QualityFlag::MalformedRating));
    }

    #[test]
    fn missing_stock_count_is_flagged() {
        let mut raw = api_record();
        raw.stock = None;
        let record = normalize(RawRecord::Api(raw), now());

        assert!(!record.in_stock);
        assert!(record.quality_flags.contains(&QualityFlag::UnknownStock));
    }

    #[test]
    fn failed_detail_carries_partial_flag() {
        let mut raw = web_record();
        raw.detail_state = DetailState::DetailFailed;
        raw.description = None;
        raw.category = None;
        let record = normalize(RawRecord::Web(raw), now());

        assert!(record.quality_flags.contains(&QualityFlag::PartialDetail));
        assert!(record.description.is_none());
    }

    #[test]
    fn renormalize_is_identity() {
        let record = normalize(RawRecord::Api(api_record()), now());
        let again = renormalize(record.clone());
        assert_eq!(again.id, record.id);
        assert_eq!(again.price, record.price);
        assert_eq!(again.quality_flags, record.quality_flags);
    }
}
