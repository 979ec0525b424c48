//! Time-expression resolution.
//!
//! Accepted forms, tried in order:
//!
//! | Form | Example | Meaning |
//! |---|---|---|
//! | 10 digits | `1700000000` | unix seconds |
//! | 13 digits | `1700000000000` | unix milliseconds |
//! | ISO-8601 date-time | `2024-01-15T08:30`, `2024-01-15T08:30:00+02:00` | calendar instant (UTC when no offset) |
//! | relative | `now`, `now-24h`, `now-2y+6m`, `now-15min` | offsets applied to the base instant, left to right |
//!
//! Relative units: `y` years, `m` months, `w` weeks, `d` days, `h` hours,
//! `min` minutes, `s` seconds. `m` is months; minutes are always `min`.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{RangeError, ResolvedRange};

static UNIX_SECONDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));
static UNIX_MILLIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").expect("valid regex"));
static ISO_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}").expect("valid regex"));
// `min` must come before `m` in the alternation.
static TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([+-])(\d+)(y|min|m|w|d|h|s)").expect("valid regex"));

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Unit of one relative term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn from_suffix(s: &str) -> Option<Self> {
        Some(match s {
            "y" => Self::Years,
            "m" => Self::Months,
            "w" => Self::Weeks,
            "d" => Self::Days,
            "h" => Self::Hours,
            "min" => Self::Minutes,
            "s" => Self::Seconds,
            _ => return None,
        })
    }

    /// Fixed length in milliseconds; `None` for calendar units.
    fn fixed_ms(self) -> Option<i64> {
        match self {
            Self::Years | Self::Months => None,
            Self::Weeks => Some(WEEK_MS),
            Self::Days => Some(DAY_MS),
            Self::Hours => Some(HOUR_MS),
            Self::Minutes => Some(MINUTE_MS),
            Self::Seconds => Some(SECOND_MS),
        }
    }
}

/// One signed `now` offset, e.g. `-2min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeTerm {
    pub negative: bool,
    pub amount: u64,
    pub unit: TimeUnit,
}

impl RelativeTerm {
    fn apply(self, at_ms: i64, expr: &str) -> Result<i64, RangeError> {
        let overflow = || RangeError::invalid_expr(expr, "offset out of range");
        match self.unit.fixed_ms() {
            Some(unit_ms) => {
                let amount = i64::try_from(self.amount).map_err(|_| overflow())?;
                let delta = amount.checked_mul(unit_ms).ok_or_else(overflow)?;
                let delta = if self.negative { -delta } else { delta };
                at_ms.checked_add(delta).ok_or_else(overflow)
            }
            None => {
                let per = if self.unit == TimeUnit::Years { 12 } else { 1 };
                let months = i64::try_from(self.amount)
                    .ok()
                    .and_then(|m| m.checked_mul(per))
                    .ok_or_else(overflow)?;
                let months = if self.negative { -months } else { months };
                let at = DateTime::<Utc>::from_timestamp_millis(at_ms).ok_or_else(overflow)?;
                shift_months(at.naive_utc(), months)
                    .map(|dt| dt.and_utc().timestamp_millis())
                    .ok_or_else(overflow)
            }
        }
    }
}

/// Move `at` by `months` calendar months, keeping day-of-month and time.
/// A day past the end of the target month rolls into the following month
/// (`01-31 + 1m` lands on `03-02` in a leap year).
fn shift_months(at: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let index = i64::from(at.year())
        .checked_mul(12)?
        .checked_add(i64::from(at.month0()))?
        .checked_add(months)?;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_days(Days::new(u64::from(at.day0())))?;
    Some(date.and_time(at.time()))
}

/// Split the part after `now` into terms. Trailing whitespace is allowed;
/// anything else left over is an error.
pub fn parse_relative_terms(rest: &str, expr: &str) -> Result<Vec<RelativeTerm>, RangeError> {
    let mut terms = Vec::new();
    let mut remaining = rest;
    while let Some(caps) = TERM_RE.captures(remaining) {
        let amount = caps[2]
            .parse::<u64>()
            .map_err(|_| RangeError::invalid_expr(expr, format!("invalid amount in `{}`", &caps[0])))?;
        let unit = TimeUnit::from_suffix(&caps[3])
            .ok_or_else(|| RangeError::invalid_expr(expr, format!("unknown unit `{}`", &caps[3])))?;
        terms.push(RelativeTerm {
            negative: &caps[1] == "-",
            amount,
            unit,
        });
        remaining = &remaining[caps[0].len()..];
    }
    if !remaining.trim().is_empty() {
        return Err(RangeError::invalid_expr(
            expr,
            format!("unexpected trailing input `{}`", remaining.trim()),
        ));
    }
    Ok(terms)
}

fn parse_iso(expr: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(expr) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(expr, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    let naive = expr.strip_suffix('Z').unwrap_or(expr);
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Resolve one time expression against `base_ms` (epoch milliseconds).
pub fn parse_time_expr(raw: &str, base_ms: i64) -> Result<i64, RangeError> {
    let expr = raw.trim();
    let result = resolve_trimmed(expr, base_ms);
    if let Err(err) = &result {
        warn!(expr = raw, error = %err, "rejected time expression");
    }
    result
}

fn resolve_trimmed(expr: &str, base_ms: i64) -> Result<i64, RangeError> {
    if expr.is_empty() {
        return Err(RangeError::invalid_expr(expr, "empty time expression"));
    }

    if UNIX_SECONDS_RE.is_match(expr) {
        let secs: i64 = expr
            .parse()
            .map_err(|_| RangeError::invalid_expr(expr, "invalid unix seconds"))?;
        return Ok(secs * SECOND_MS);
    }
    if UNIX_MILLIS_RE.is_match(expr) {
        return expr
            .parse()
            .map_err(|_| RangeError::invalid_expr(expr, "invalid unix milliseconds"));
    }
    if ISO_PREFIX_RE.is_match(expr) {
        return parse_iso(expr).ok_or_else(|| RangeError::invalid_expr(expr, "invalid date"));
    }

    let Some(rest) = expr.strip_prefix("now") else {
        return Err(RangeError::invalid_expr(
            expr,
            "expression must start with \"now\"",
        ));
    };
    parse_relative_terms(rest, expr)?
        .into_iter()
        .try_fold(base_ms, |at, term| term.apply(at, expr))
}

/// Resolve both ends against the same base; `from` must precede `to`.
pub fn resolve_range(from_expr: &str, to_expr: &str, base_ms: i64) -> Result<ResolvedRange, RangeError> {
    let from_ms = parse_time_expr(from_expr, base_ms)?;
    let to_ms = parse_time_expr(to_expr, base_ms)?;
    ResolvedRange::new(from_ms, to_ms)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    const BASE: i64 = 1_705_276_800_000; // 2024-01-15T00:00:00Z

    #[test]
    fn bare_now_is_base() {
        assert_eq!(parse_time_expr("now", BASE).unwrap(), BASE);
        assert_eq!(parse_time_expr("  now  ", BASE).unwrap(), BASE);
    }

    #[test]
    fn unix_literals() {
        assert_eq!(parse_time_expr("1700000000", 0).unwrap(), 1_700_000_000_000);
        assert_eq!(parse_time_expr("1700000000000", 0).unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn iso_forms() {
        let expected = utc(2024, 1, 15, 8, 30);
        assert_eq!(parse_time_expr("2024-01-15T08:30", 0).unwrap(), expected);
        assert_eq!(parse_time_expr("2024-01-15T08:30:00Z", 0).unwrap(), expected);
        assert_eq!(parse_time_expr("2024-01-15T10:30:00+02:00", 0).unwrap(), expected);
        assert_eq!(parse_time_expr("2024-01-15T08:30:00.000", 0).unwrap(), expected);
    }

    #[test]
    fn invalid_iso_is_rejected() {
        let err = parse_time_expr("2024-13-45T99:99", 0).unwrap_err();
        assert!(matches!(err, RangeError::InvalidExpression { .. }));
    }

    #[test]
    fn fixed_units() {
        assert_eq!(parse_time_expr("now-24h", BASE).unwrap(), BASE - 24 * HOUR_MS);
        assert_eq!(parse_time_expr("now-1w", BASE).unwrap(), BASE - WEEK_MS);
        assert_eq!(parse_time_expr("now+30s", BASE).unwrap(), BASE + 30 * SECOND_MS);
        assert_eq!(parse_time_expr("now-2min", BASE).unwrap(), BASE - 2 * MINUTE_MS);
        assert_eq!(parse_time_expr("now-1d-12h", BASE).unwrap(), BASE - 36 * HOUR_MS);
    }

    #[test]
    fn minutes_are_not_months() {
        let minutes = parse_time_expr("now-2min", BASE).unwrap();
        let months = parse_time_expr("now-2m", BASE).unwrap();
        assert_ne!(minutes, months);
        assert_eq!(months, utc(2023, 11, 15, 0, 0));
    }

    #[test]
    fn calendar_terms_apply_left_to_right() {
        assert_eq!(parse_time_expr("now-1y+6m", BASE).unwrap(), utc(2023, 7, 15, 0, 0));
        assert_eq!(parse_time_expr("now-2y+6m", BASE).unwrap(), utc(2022, 7, 15, 0, 0));
    }

    #[test]
    fn month_overflow_rolls_into_next_month() {
        let leap = utc(2024, 2, 29, 0, 0);
        assert_eq!(parse_time_expr("now-1y", leap).unwrap(), utc(2023, 3, 1, 0, 0));
        let jan31 = utc(2024, 1, 31, 0, 0);
        assert_eq!(parse_time_expr("now+1m", jan31).unwrap(), utc(2024, 3, 2, 0, 0));
        // Days that exist in the target month are kept.
        assert_eq!(parse_time_expr("now-1m", utc(2024, 3, 15, 6, 0)).unwrap(), utc(2024, 2, 15, 6, 0));
        assert_eq!(parse_time_expr("now-13m", jan31).unwrap(), utc(2022, 12, 31, 0, 0));
    }

    #[test]
    fn whitespace_between_terms_is_allowed() {
        assert_eq!(parse_time_expr("now -1h +30min", BASE).unwrap(), BASE - 30 * MINUTE_MS);
    }

    #[test]
    fn rejects_bad_input() {
        for bad in ["", "   ", "yesterday", "now-", "now-1x", "now-1h garbage", "now1h", "12345", "now--1h"] {
            let err = parse_time_expr(bad, BASE).unwrap_err();
            assert!(
                matches!(err, RangeError::InvalidExpression { .. }),
                "expected InvalidExpression for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn huge_amounts_are_rejected_not_wrapped() {
        assert!(parse_time_expr("now-99999999999999999999s", BASE).is_err());
        assert!(parse_time_expr("now+9999999999999w", BASE).is_err());
        assert!(parse_time_expr("now+9999999999y", BASE).is_err());
    }

    #[test]
    fn resolve_range_orders_bounds() {
        let r = resolve_range("now-24h", "now", BASE).unwrap();
        assert_eq!(r.from_ms(), BASE - DAY_MS);
        assert_eq!(r.to_ms(), BASE);
        let err = resolve_range("now", "now-1h", BASE).unwrap_err();
        assert!(matches!(err, RangeError::InvalidRange { .. }));
        assert!(resolve_range("now", "now", BASE).is_err());
    }
}
