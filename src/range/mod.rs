//! Time-range selection for dashboard queries.
//!
//! - [`expr`]: time-expression parsing (`now-24h`, unix literals, ISO dates)
//! - [`controller`]: active range, selection modes and change events
//! - [`state`]: persisted selection snapshot

pub mod controller;
pub mod expr;
pub mod state;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use controller::{Clock, FixedClock, RangeController, RangeMode, RangePreset, RangeUpdate, SystemClock};
pub use expr::{parse_time_expr, resolve_range};
pub use state::{JsonFileStore, PersistedRangeState, PreferenceStore};

/// Errors from resolving time expressions or validating ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid time expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("invalid range: {reason}")]
    InvalidRange {
        from_ms: Option<i64>,
        to_ms: Option<i64>,
        reason: String,
    },
}

impl RangeError {
    pub(crate) fn invalid_expr(expr: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// A validated `[from_ms, to_ms)` window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct ResolvedRange {
    from_ms: i64,
    to_ms: i64,
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    from_ms: i64,
    to_ms: i64,
}

impl TryFrom<RawRange> for ResolvedRange {
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.from_ms, raw.to_ms)
    }
}

impl From<ResolvedRange> for RawRange {
    fn from(r: ResolvedRange) -> Self {
        Self {
            from_ms: r.from_ms,
            to_ms: r.to_ms,
        }
    }
}

impl ResolvedRange {
    /// Requires `from_ms < to_ms`.
    pub fn new(from_ms: i64, to_ms: i64) -> Result<Self, RangeError> {
        if from_ms >= to_ms {
            return Err(RangeError::InvalidRange {
                from_ms: Some(from_ms),
                to_ms: Some(to_ms),
                reason: "from must be < to".to_string(),
            });
        }
        Ok(Self { from_ms, to_ms })
    }

    /// Validate bounds that arrive as floating-point milliseconds.
    pub fn from_f64_ms(from_ms: f64, to_ms: f64) -> Result<Self, RangeError> {
        let to_i64 = |v: f64| (v.is_finite() && v.abs() < i64::MAX as f64).then_some(v as i64);
        match (to_i64(from_ms), to_i64(to_ms)) {
            (Some(from), Some(to)) => Self::new(from, to),
            (from, to) => Err(RangeError::InvalidRange {
                from_ms: from,
                to_ms: to,
                reason: "bounds must be finite".to_string(),
            }),
        }
    }

    /// The 24 hours up to `now_ms`.
    pub fn last_day(now_ms: i64) -> Self {
        Self {
            from_ms: now_ms - 24 * 3_600_000,
            to_ms: now_ms,
        }
    }

    pub fn from_ms(&self) -> i64 {
        self.from_ms
    }

    pub fn to_ms(&self) -> i64 {
        self.to_ms
    }

    /// `floor(from_ms / 1000)`, for outbound queries.
    pub fn from_seconds(&self) -> i64 {
        self.from_ms.div_euclid(1000)
    }

    /// `floor(to_ms / 1000)`, for outbound queries.
    pub fn to_seconds(&self) -> i64 {
        self.to_ms.div_euclid(1000)
    }

    pub fn duration_ms(&self) -> i64 {
        self.to_ms - self.from_ms
    }
}
