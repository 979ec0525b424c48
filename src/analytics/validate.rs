//! Output invariant checks for rendered series.
//!
//! Provides deterministic checks for:
//! - **Point budgets**: per-series and per-call point caps.
//! - **Ordering**: strictly ascending timestamps within a series.
//! - **Mass preservation**: each series sums to its key's raw total.
//!
//! Output is a structured [`ValidationReport`] that serialises to JSON
//! for `sniffly-view render --validate --json`.

use serde::Serialize;

use super::types::{Bucket, Series, SeriesBudget};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Severity level for a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation check result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub id: String,
    pub ok: bool,
    pub severity: Severity,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// A series whose total moved away from the raw input total.
#[derive(Debug, Clone, Serialize)]
pub struct DriftEntry {
    pub chart: String,
    pub series: String,
    pub raw_total: f64,
    pub output_total: f64,
    pub delta: f64,
}

/// Full validation report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
    pub drift: Vec<DriftEntry>,
}

impl ValidationReport {
    /// True if every check passed.
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    /// Count of checks that failed with a given severity.
    pub fn count_failures(&self, sev: Severity) -> usize {
        self.checks
            .iter()
            .filter(|c| !c.ok && c.severity == sev)
            .count()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.checks.extend(other.checks);
        self.drift.extend(other.drift);
    }

    /// Produce the JSON value, with an `ok` summary flag.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": self.all_ok(),
            "failures": self.checks.iter().filter(|c| !c.ok).count(),
            "checks": self.checks,
            "drift": self.drift,
        })
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub budget: SeriesBudget,
    /// Absolute difference below which totals count as equal (float noise).
    pub drift_abs_threshold: f64,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            budget: SeriesBudget::default(),
            drift_abs_threshold: 1e-6,
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Validate the series produced from categorical `raw` buckets.
pub fn validate_categorical(
    chart: &str,
    raw: &[Bucket],
    series: &[Series],
    config: &ValidateConfig,
) -> ValidationReport {
    let mut report = shape_checks(chart, series, config);

    for s in series {
        let raw_total: f64 = raw
            .iter()
            .filter_map(|b| b.counts.get(&s.name))
            .sum();
        push_drift(&mut report, chart, &s.name, raw_total, s.total(), config);
    }
    report.checks.push(mass_check(chart, &report.drift));
    report
}

/// Validate one numeric counter series against its raw `(ts, value)` samples.
pub fn validate_counter(
    chart: &str,
    raw: &[(i64, f64)],
    series: &Series,
    config: &ValidateConfig,
) -> ValidationReport {
    let mut report = shape_checks(chart, std::slice::from_ref(series), config);
    let raw_total: f64 = raw.iter().map(|(_, v)| v).sum();
    push_drift(&mut report, chart, &series.name, raw_total, series.total(), config);
    report.checks.push(mass_check(chart, &report.drift));
    report
}

fn shape_checks(chart: &str, series: &[Series], config: &ValidateConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    let longest = series.iter().map(Series::len).max().unwrap_or(0);
    let per_series_ok = longest <= config.budget.max_timeline_points;
    report.checks.push(Check {
        id: format!("{chart}.points_per_series"),
        ok: per_series_ok,
        severity: if per_series_ok {
            Severity::Info
        } else {
            Severity::Error
        },
        details: format!(
            "longest series has {longest} points (limit {})",
            config.budget.max_timeline_points
        ),
        suggested_action: None,
    });

    let total: usize = series.iter().map(Series::len).sum();
    let total_ok = total <= config.budget.max_total_points;
    report.checks.push(Check {
        id: format!("{chart}.total_points"),
        ok: total_ok,
        severity: if total_ok {
            Severity::Info
        } else {
            Severity::Error
        },
        details: format!(
            "{total} points across {} series (limit {})",
            series.len(),
            config.budget.max_total_points
        ),
        suggested_action: None,
    });

    let unordered: Vec<&str> = series
        .iter()
        .filter(|s| s.points.windows(2).any(|w| w[1].0 <= w[0].0))
        .map(|s| s.name.as_str())
        .collect();
    report.checks.push(Check {
        id: format!("{chart}.ascending"),
        ok: unordered.is_empty(),
        severity: if unordered.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: if unordered.is_empty() {
            "timestamps strictly ascending".to_string()
        } else {
            format!("out-of-order timestamps in: {}", unordered.join(", "))
        },
        suggested_action: None,
    });

    report
}

fn push_drift(
    report: &mut ValidationReport,
    chart: &str,
    series: &str,
    raw_total: f64,
    output_total: f64,
    config: &ValidateConfig,
) {
    let delta = output_total - raw_total;
    if delta.abs() > config.drift_abs_threshold {
        report.drift.push(DriftEntry {
            chart: chart.to_string(),
            series: series.to_string(),
            raw_total,
            output_total,
            delta,
        });
    }
}

fn mass_check(chart: &str, drift: &[DriftEntry]) -> Check {
    let drifted = drift.iter().filter(|d| d.chart == chart).count();
    Check {
        id: format!("{chart}.mass_preserved"),
        ok: drifted == 0,
        severity: if drifted == 0 {
            Severity::Info
        } else {
            Severity::Error
        },
        details: if drifted == 0 {
            "every series sums to its raw total".to_string()
        } else {
            format!("{drifted} series drifted from their raw totals")
        },
        suggested_action: (drifted > 0)
            .then(|| "check for raw samples before the first bucket of the range".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
