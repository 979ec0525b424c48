//! Gap filling and downsampling for numeric counters.
//!
//! Traffic charts plot two fixed counters (bytes up, bytes down). Unlike the
//! categorical builder there is no key selection, but interior slots with no
//! sample are materialized as zeros so the line drops to the axis instead of
//! interpolating across the hole.
//!
//! A missing slot is read as "no traffic in that interval". That is
//! indistinguishable from "the sensor was not capturing"; callers that can
//! tell the two apart should not feed offline intervals through here.

use super::bucketing::{DownsamplePlan, modal_step};
use super::types::{NumericBucket, Series, SeriesBudget};

/// Fills interior gaps of a `(timestamp_sec, value)` series.
#[derive(Clone, Copy, Debug, Default)]
pub struct GapFiller {
    budget: SeriesBudget,
    base_step: Option<i64>,
}

impl GapFiller {
    pub fn new(budget: SeriesBudget) -> Self {
        Self {
            budget,
            base_step: None,
        }
    }

    /// Use a known sampling step (seconds) instead of the modal gap.
    pub fn with_base_step(mut self, step_sec: i64) -> Self {
        self.base_step = Some(step_sec).filter(|s| *s > 0);
        self
    }

    /// Sort, then fill or downsample.
    ///
    /// With one point or fewer, or no positive gap, the sorted input comes
    /// back unchanged. Otherwise every base-step slot between the first and
    /// last sample is emitted (zero when absent), or, when that exceeds the
    /// point budget, window sums over `factor` slots. The last sample is
    /// always on the output timeline.
    pub fn fill(&self, points: &[(i64, f64)]) -> Vec<(i64, f64)> {
        let mut pts = points.to_vec();
        pts.sort_by_key(|(t, _)| *t);
        if pts.len() <= 1 {
            return pts;
        }

        let mut observed: Vec<i64> = pts.iter().map(|(t, _)| *t).collect();
        observed.dedup();
        let Some(step) = self.base_step.or_else(|| modal_step(&observed)) else {
            return pts;
        };
        if observed.len() <= 1 {
            return pts;
        }

        let plan = DownsamplePlan::new(&observed, Some(step), self.budget.max_timeline_points);
        let values = plan.accumulate(pts.iter().copied());
        plan.points.iter().copied().zip(values).collect()
    }

    /// `[Up, Down]` chart series (millisecond timestamps) for one device.
    pub fn traffic_series(&self, buckets: &[NumericBucket]) -> Vec<Series> {
        let up: Vec<(i64, f64)> = buckets.iter().map(|b| (b.timestamp_sec, b.up)).collect();
        let down: Vec<(i64, f64)> = buckets.iter().map(|b| (b.timestamp_sec, b.down)).collect();
        vec![
            Series::new("Up", to_millis(self.fill(&up))),
            Series::new("Down", to_millis(self.fill(&down))),
        ]
    }
}

fn to_millis(points: Vec<(i64, f64)>) -> Vec<(i64, f64)> {
    points.into_iter().map(|(t, v)| (t * 1000, v)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
