//! Domain module - core entities of the extraction pipeline
//!
//! Raw per-source record shapes, the unified canonical record, and the
//! statistics/summary types handed to the sink.

pub mod product;
pub mod stats;

pub use product::{
    CanonicalRecord, DataSource, DetailState, PriceCategory, QualityFlag, RatingCategory,
    RawApiRecord, RawRecord, RawWebRecord,
};
pub use stats::{PriceStats, RunSummary, Statistics};
