//! Human-readable labels for byte counts, numbers and timestamps.
//!
//! Non-finite inputs render as `—`.

use chrono::{DateTime, Utc};

const PLACEHOLDER: &str = "—";

/// `1536.0` → `"1.50 KB"`. Base 1024; two decimals below 10, one below 100,
/// none otherwise; plain bytes never have decimals. Negative values clamp to 0.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() {
        return PLACEHOLDER.to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut v = bytes.max(0.0);
    let mut idx = 0;
    while v >= 1024.0 && idx < UNITS.len() - 1 {
        v /= 1024.0;
        idx += 1;
    }
    let digits = match (idx, v) {
        (0, _) => 0,
        (_, v) if v < 10.0 => 2,
        (_, v) if v < 100.0 => 1,
        _ => 0,
    };
    format!("{v:.digits$} {}", UNITS[idx])
}

/// Thousands separators, at most three fraction digits: `1234567.5` → `"1,234,567.5"`.
pub fn format_number(v: f64) -> String {
    if !v.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let rounded = format!("{:.3}", v.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((&rounded, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(rounded.len() + int_part.len() / 3 + 1);
    if v < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
        out.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// Short axis labels: `950` → `"950"`, `12_300` → `"12.3K"`, `4e9` → `"4B"`.
pub fn format_compact(v: f64) -> String {
    if !v.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let abs = v.abs();
    let (scaled, suffix) = if abs >= 1e9 {
        (v / 1e9, "B")
    } else if abs >= 1e6 {
        (v / 1e6, "M")
    } else if abs >= 1e3 {
        (v / 1e3, "K")
    } else {
        (v, "")
    };
    let mut text = format!("{scaled:.1}");
    if text.ends_with(".0") {
        text.truncate(text.len() - 2);
    }
    format!("{text}{suffix}")
}

/// `YYYY-MM-DD HH:MM` in UTC.
pub fn format_datetime(ts_ms: f64) -> String {
    if !ts_ms.is_finite() {
        return PLACEHOLDER.to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(ts_ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}
