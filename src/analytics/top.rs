//! Top-K ranking for table views.

use super::types::{Bucket, CountMap, TopRow};

/// Default row limit for table views.
pub const DEFAULT_TABLE_LIMIT: usize = 30;

/// Entries of `totals` sorted by descending value, stable on ties.
pub(crate) fn rank_totals(totals: &CountMap) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = totals.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Rank an already-aggregated map and keep the first `limit` rows.
///
/// A missing map is an empty table, not an error.
pub fn top_k(stats: Option<&CountMap>, limit: usize) -> Vec<TopRow> {
    let Some(stats) = stats else {
        return Vec::new();
    };
    rank_totals(stats)
        .into_iter()
        .take(limit)
        .map(|(key, value)| TopRow::new(key, value))
        .collect()
}

/// Sum counts across `buckets`, then rank.
pub fn aggregate_top(buckets: &[Bucket], limit: usize) -> Vec<TopRow> {
    let mut totals = CountMap::new();
    for bucket in buckets {
        for (key, value) in &bucket.counts {
            *totals.entry(key.clone()).or_insert(0.0) += *value;
        }
    }
    top_k(Some(&totals), limit)
}
