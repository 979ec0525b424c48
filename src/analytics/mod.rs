//! Shared analytics library.
//!
//! Reshapes already-bucketed, already range-scoped traffic data into bounded
//! chart series and ranked table rows. Everything here is a pure function of
//! its inputs.
//!
//! # Module structure
//!
//! - [`types`]: buckets, series, rows, point budgets
//! - [`bucketing`]: modal step inference and downsample planning
//! - [`series`]: categorical buckets → legend-stable series
//! - [`gaps`]: numeric counters → gap-filled series
//! - [`top`]: top-K ranking for tables
//! - [`derive`]: per-device dashboard views
//! - [`validate`]: point-budget and mass-preservation checks

pub mod bucketing;
pub mod derive;
pub mod gaps;
pub mod series;
pub mod top;
pub mod types;
pub mod validate;

// Re-export the most commonly used items at the crate::analytics level.
pub use bucketing::{DownsamplePlan, modal_step};
pub use derive::{ChartViews, TableViews, chart_views, table_views};
pub use gaps::GapFiller;
pub use series::{BucketSeriesBuilder, latest_bucket_keys};
pub use top::{DEFAULT_TABLE_LIMIT, aggregate_top, top_k};
pub use types::{
    Bucket, CountMap, MAX_TIMELINE_POINTS, MAX_TOTAL_POINTS, NumericBucket, Series, SeriesBudget,
    TopRow,
};
pub use validate::{ValidateConfig, ValidationReport};
