//! Categorical bucket → chart series.
//!
//! Turns one count map per timestamp into a bounded number of named series.
//! Key selection keeps the legend stable across refreshes (preferred keys go
//! first), downsampling keeps the point count bounded, and window sums keep
//! every key's total intact.

use indexmap::IndexSet;
use tracing::debug;

use super::bucketing::{DownsamplePlan, modal_step, observed_timeline};
use super::top::rank_totals;
use super::types::{Bucket, CountMap, Series, SeriesBudget};

/// Default number of ranked keys added after the preferred ones.
pub const DEFAULT_TOP_N: usize = 6;

/// Builder for categorical chart series.
///
/// ```rust,ignore
/// let series = BucketSeriesBuilder::new()
///     .top_n(12)
///     .preferred_keys(latest_keys)
///     .max_series(12)
///     .build(&buckets);
/// ```
#[derive(Clone, Debug)]
pub struct BucketSeriesBuilder {
    top_n: usize,
    preferred_keys: Vec<String>,
    max_series: Option<usize>,
    budget: SeriesBudget,
    base_step: Option<i64>,
}

impl Default for BucketSeriesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketSeriesBuilder {
    pub fn new() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            preferred_keys: Vec::new(),
            max_series: None,
            budget: SeriesBudget::default(),
            base_step: None,
        }
    }

    /// Number of highest-total keys added after the preferred keys.
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Keys forced into the selection ahead of rank, in priority order.
    pub fn preferred_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Hard cap on selected keys. Defaults to `top_n`.
    pub fn max_series(mut self, max_series: usize) -> Self {
        self.max_series = Some(max_series);
        self
    }

    pub fn budget(mut self, budget: SeriesBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Use a known sampling step (seconds) instead of inferring it.
    pub fn base_step(mut self, step_sec: i64) -> Self {
        self.base_step = Some(step_sec).filter(|s| *s > 0);
        self
    }

    /// Selected keys in priority order: preferred first, then ranked.
    pub fn select_keys(&self, totals: &CountMap) -> Vec<String> {
        let max_series = self.max_series.unwrap_or(self.top_n);
        let mut keys: IndexSet<&str> = self
            .preferred_keys
            .iter()
            .map(String::as_str)
            .filter(|k| !k.is_empty())
            .collect();
        let ranked = rank_totals(totals)
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| !keys.contains(k))
            .take(self.top_n)
            .collect::<Vec<_>>();
        keys.extend(ranked);
        keys.into_iter()
            .take(max_series)
            .map(str::to_string)
            .collect()
    }

    /// Build the series for `buckets`. Empty input yields no series.
    pub fn build(&self, buckets: &[Bucket]) -> Vec<Series> {
        let mut totals = CountMap::new();
        for bucket in buckets {
            for (key, value) in &bucket.counts {
                *totals.entry(key.clone()).or_insert(0.0) += *value;
            }
        }

        let observed = observed_timeline(buckets.iter().map(|b| b.timestamp_sec));
        if observed.is_empty() {
            return Vec::new();
        }

        let step = self.base_step.or_else(|| modal_step(&observed));
        let plan = DownsamplePlan::new(&observed, step, self.budget.max_timeline_points);

        let mut keys = self.select_keys(&totals);
        let by_budget = self.budget.max_series_for(plan.len());
        if keys.len() > by_budget {
            debug!(
                selected = keys.len(),
                kept = by_budget,
                timeline = plan.len(),
                "total point budget trims series"
            );
            keys.truncate(by_budget);
        }

        let mut values: Vec<Vec<f64>> = vec![vec![0.0; plan.len()]; keys.len()];
        let index: IndexSet<&str> = keys.iter().map(String::as_str).collect();
        for bucket in buckets {
            let Some(slot) = plan.slot_of(bucket.timestamp_sec) else {
                continue;
            };
            for (key, value) in &bucket.counts {
                if let Some(k) = index.get_index_of(key.as_str()) {
                    values[k][slot] += *value;
                }
            }
        }

        keys.iter()
            .zip(values)
            .filter(|(_, vals)| vals.iter().any(|v| *v != 0.0))
            .map(|(key, vals)| {
                let points = plan
                    .points
                    .iter()
                    .zip(vals)
                    .map(|(&t, v)| (t * 1000, v))
                    .collect();
                Series::new(key.clone(), points)
            })
            .collect()
    }
}

/// Keys of the most recent bucket, largest count first.
///
/// Used as preferred keys so a chart's legend follows what is dominant right
/// now instead of reshuffling on every refresh.
pub fn latest_bucket_keys(buckets: &[Bucket]) -> Vec<String> {
    buckets
        .iter()
        .max_by_key(|b| b.timestamp_sec)
        .map(|latest| {
            rank_totals(&latest.counts)
                .into_iter()
                .map(|(k, _)| k.to_string())
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
