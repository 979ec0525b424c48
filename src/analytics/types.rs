//! Shared types for the analytics library.
//!
//! These shapes are what the series builder, gap filler and top-K ranking
//! consume and produce. Raw inputs are normalized into them once, at the
//! ingestion boundary (see [`crate::model::types`]), so nothing in here has
//! to care about the wire format.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Count maps and buckets
// ---------------------------------------------------------------------------

/// Canonical categorical distribution: label → count.
///
/// Insertion-ordered so that ties in ranking break by first encounter.
pub type CountMap = IndexMap<String, f64>;

/// One discrete sample of a categorical distribution at one instant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket start, unix seconds.
    pub timestamp_sec: i64,
    pub counts: CountMap,
}

impl Bucket {
    pub fn new(timestamp_sec: i64, counts: CountMap) -> Self {
        Self {
            timestamp_sec,
            counts,
        }
    }

    /// Build a bucket from `(label, count)` pairs; repeated labels accumulate.
    pub fn from_pairs<K, I>(timestamp_sec: i64, pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut counts = CountMap::new();
        for (k, v) in pairs {
            *counts.entry(k.into()).or_insert(0.0) += v;
        }
        Self {
            timestamp_sec,
            counts,
        }
    }
}

/// One sample of the two traffic counters of a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericBucket {
    pub timestamp_sec: i64,
    pub up: f64,
    pub down: f64,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A named, time-ordered chart series. Points are `(timestamp_ms, value)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(i64, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, points: Vec<(i64, f64)>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Sum of all point values.
    pub fn total(&self) -> f64 {
        self.points.iter().map(|(_, v)| v).sum()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A ranked table row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopRow {
    pub key: String,
    pub value: f64,
}

impl TopRow {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

// ---------------------------------------------------------------------------
// Budgets
// ---------------------------------------------------------------------------

/// Upper bound on points in one rendered series.
pub const MAX_TIMELINE_POINTS: usize = 1200;

/// Upper bound on points across all series emitted by one builder call.
pub const MAX_TOTAL_POINTS: usize = 40_000;

/// Point budget applied by the series builder and the gap filler.
///
/// Chart renderers keep internal copies of every series, so series count ×
/// point count has to stay bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesBudget {
    pub max_timeline_points: usize,
    pub max_total_points: usize,
}

impl Default for SeriesBudget {
    fn default() -> Self {
        Self {
            max_timeline_points: MAX_TIMELINE_POINTS,
            max_total_points: MAX_TOTAL_POINTS,
        }
    }
}

impl SeriesBudget {
    /// How many series of `timeline_len` points fit the total budget (at least 1).
    pub fn max_series_for(&self, timeline_len: usize) -> usize {
        (self.max_total_points / timeline_len.max(1)).max(1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
