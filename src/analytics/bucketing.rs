//! Time-bucket math shared by the series builder and the gap filler.
//!
//! Raw buckets arrive at a fixed (but unannounced) sampling step. The step is
//! inferred from the data, then a downsample factor is chosen so the output
//! grid fits the point budget. Every raw timestamp maps to exactly one output
//! slot, which is what makes window sums mass-preserving.

use std::collections::HashMap;

use tracing::debug;

// ---------------------------------------------------------------------------
// Step inference
// ---------------------------------------------------------------------------

/// Most frequent positive gap between consecutive timestamps.
///
/// `sorted` must be ascending. Ties go to the gap seen first. Returns `None`
/// when there is no positive gap (zero or one distinct timestamp). A stray
/// off-grid sample does not shrink the step.
pub fn modal_step(sorted: &[i64]) -> Option<i64> {
    let mut freq: HashMap<i64, (usize, usize)> = HashMap::new();
    for (order, pair) in sorted.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        if delta > 0 {
            freq.entry(delta).or_insert((0, order)).0 += 1;
        }
    }
    freq.into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(delta, _)| delta)
}

// ---------------------------------------------------------------------------
// Downsample plan
// ---------------------------------------------------------------------------

/// Output timeline for one downsampling pass.
///
/// `points[k]` owns the half-open window `[points[k], points[k + 1])`; the last
/// point owns everything from itself to the end of the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownsamplePlan {
    /// Inferred (or supplied) base sampling step; `None` when no step exists.
    pub base_step: Option<i64>,
    /// Integer multiple of `base_step` used as the output step.
    pub factor: i64,
    /// Output timestamps, ascending, same unit as the input.
    pub points: Vec<i64>,
}

impl DownsamplePlan {
    /// Plan the output grid for ascending, distinct `observed` timestamps.
    ///
    /// With no usable step the observed timestamps are the timeline. Otherwise
    /// the grid starts at the first sample, advances by `base_step * factor`,
    /// and the last sample is appended when the grid misses it. `factor` grows
    /// until the grid, appended point included, fits `max_points`.
    pub fn new(observed: &[i64], base_step: Option<i64>, max_points: usize) -> Self {
        let (Some(&first), Some(&last)) = (observed.first(), observed.last()) else {
            return Self {
                base_step,
                factor: 1,
                points: Vec::new(),
            };
        };
        let step = match base_step.filter(|s| *s > 0) {
            Some(step) if last > first => step,
            _ => {
                return Self {
                    base_step,
                    factor: 1,
                    points: observed.to_vec(),
                };
            }
        };

        let max_points = max_points.max(2) as i64;
        let span = last - first;
        let predicted = span / step + 1;
        let mut factor = if predicted > max_points {
            (predicted + max_points - 1) / max_points
        } else {
            1
        };
        let (window, grid_len, aligned) = loop {
            let window = step.saturating_mul(factor);
            let grid_len = span / window + 1;
            let aligned = span % window == 0;
            if grid_len + i64::from(!aligned) <= max_points {
                break (window, grid_len, aligned);
            }
            factor += 1;
        };

        let mut points: Vec<i64> = (0..grid_len).map(|k| first + k * window).collect();
        if !aligned {
            points.push(last);
        }

        debug!(
            step,
            factor,
            predicted,
            output_points = points.len(),
            "planned downsample grid"
        );

        Self {
            base_step: Some(step),
            factor,
            points,
        }
    }

    /// Output step (`base_step * factor`), when a step exists.
    pub fn window(&self) -> Option<i64> {
        self.base_step
            .filter(|_| self.points.len() > 1)
            .map(|s| s.saturating_mul(self.factor))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the output point whose window contains `ts`.
    ///
    /// Timestamps before the first point have no slot.
    pub fn slot_of(&self, ts: i64) -> Option<usize> {
        let first = *self.points.first()?;
        if ts < first {
            return None;
        }
        let last_idx = self.points.len() - 1;
        match self.window() {
            Some(window) => {
                if ts >= self.points[last_idx] {
                    return Some(last_idx);
                }
                let idx = ((ts - first) / window) as usize;
                Some(idx.min(last_idx))
            }
            // No grid: windows are delimited by the observed points themselves.
            None => match self.points.binary_search(&ts) {
                Ok(idx) => Some(idx),
                Err(idx) => Some(idx - 1),
            },
        }
    }

    /// Sum `(timestamp, value)` samples into one value per output point.
    pub fn accumulate<I>(&self, samples: I) -> Vec<f64>
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        let mut out = vec![0.0; self.points.len()];
        for (ts, value) in samples {
            if let Some(slot) = self.slot_of(ts) {
                out[slot] += value;
            }
        }
        out
    }
}

/// Sorted, deduplicated timestamps.
pub fn observed_timeline<I: IntoIterator<Item = i64>>(timestamps: I) -> Vec<i64> {
    let mut ts: Vec<i64> = timestamps.into_iter().collect();
    ts.sort_unstable();
    ts.dedup();
    ts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
