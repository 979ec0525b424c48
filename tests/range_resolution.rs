mod util;

use chrono::{TimeZone, Utc};
use sniffly_view::range::{
    FixedClock, JsonFileStore, PreferenceStore, RangeController, RangeError, RangeMode, RangePreset,
    ResolvedRange, parse_time_expr, resolve_range,
};
use util::TestTracing;

fn utc_ms(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().timestamp_millis()
}

#[test]
fn now_is_the_base_exactly() {
    let base = 1_705_276_812_345;
    assert_eq!(parse_time_expr("now", base).unwrap(), base);
    assert_eq!(parse_time_expr("  now  ", base).unwrap(), base);
}

#[test]
fn unix_literals() {
    assert_eq!(parse_time_expr("1700000000", 0).unwrap(), 1_700_000_000_000);
    assert_eq!(parse_time_expr("1700000000000", 0).unwrap(), 1_700_000_000_000);
}

#[test]
fn minutes_are_not_months() {
    let base = utc_ms(2024, 1, 15, 0, 0);
    let minutes = parse_time_expr("now-2min", base).unwrap();
    let months = parse_time_expr("now-2m", base).unwrap();
    assert_ne!(minutes, months);
    assert_eq!(minutes, base - 120_000);
    assert_eq!(months, utc_ms(2023, 11, 15, 0, 0));
}

#[test]
fn calendar_terms_chain() {
    let base = utc_ms(2024, 1, 15, 0, 0);
    assert_eq!(parse_time_expr("now-1y+6m", base).unwrap(), utc_ms(2023, 7, 15, 0, 0));
    assert_eq!(
        parse_time_expr("now-1w-1d+2h", base).unwrap(),
        base - 8 * 86_400_000 + 2 * 3_600_000
    );
}

#[test]
fn month_end_overflow_rolls_forward() {
    let base = utc_ms(2024, 3, 31, 12, 0);
    assert_eq!(parse_time_expr("now-1m", base).unwrap(), utc_ms(2024, 3, 2, 12, 0));
    let leap = utc_ms(2024, 2, 29, 0, 0);
    assert_eq!(parse_time_expr("now-1y", leap).unwrap(), utc_ms(2023, 3, 1, 0, 0));
    assert_eq!(parse_time_expr("now+4y", leap).unwrap(), utc_ms(2028, 2, 29, 0, 0));
}

#[test]
fn iso_forms() {
    let expected = utc_ms(2024, 1, 15, 10, 30);
    for expr in [
        "2024-01-15T10:30",
        "2024-01-15T10:30:00Z",
        "2024-01-15T10:30:00.000Z",
        "2024-01-15T12:30:00+02:00",
    ] {
        assert_eq!(parse_time_expr(expr, 0).unwrap(), expected, "{expr}");
    }
}

#[test]
fn rejected_expressions_are_logged() {
    let tracing = TestTracing::new();
    let _guard = tracing.install();
    for bad in ["", "yesterday", "now-", "now-5q", "2024-13-45T99:99", "17000000000"] {
        let err = parse_time_expr(bad, 0).unwrap_err();
        assert!(matches!(err, RangeError::InvalidExpression { .. }), "{bad}");
    }
    tracing.assert_contains("yesterday");
}

#[test]
fn resolve_range_requires_order() {
    let base = utc_ms(2024, 1, 15, 0, 0);
    let r = resolve_range("now-24h", "now", base).unwrap();
    assert_eq!(r.duration_ms(), 86_400_000);
    assert!(matches!(
        resolve_range("now", "now-1h", base),
        Err(RangeError::InvalidRange { .. })
    ));
}

#[test]
fn invalid_range_leaves_active_range_untouched() {
    let now = utc_ms(2024, 1, 15, 0, 0);
    let mut controller = RangeController::new(FixedClock::new(now));
    controller.apply_absolute(now - 1_000, now).unwrap();
    let before = controller.resolved();
    let generation = controller.generation();

    let err = controller.apply_absolute(now, now).unwrap_err();
    assert!(matches!(err, RangeError::InvalidRange { .. }));
    assert_eq!(controller.resolved(), before);
    assert_eq!(controller.generation(), generation);
    assert!(controller.error().is_some());

    controller.select_preset(RangePreset::LastHour).unwrap();
    assert!(controller.error().is_none());
}

#[test]
fn preset_follows_the_clock() {
    let clock = FixedClock::new(utc_ms(2024, 1, 15, 0, 0));
    let mut controller = RangeController::new(&clock);
    controller.select_preset(RangePreset::Last6Hours).unwrap();
    let first = controller.resolved();
    clock.advance(60_000);
    controller.activate(RangeMode::Preset).unwrap();
    assert!(controller.resolved().from_ms() > first.from_ms());
    assert_eq!(controller.resolved().duration_ms(), 6 * 3_600_000);
}

#[test]
fn selection_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("range.json"));
    let now = utc_ms(2024, 1, 15, 0, 0);

    let mut controller = RangeController::new(FixedClock::new(now));
    controller.apply_expressions("now-7d", "now-1d").unwrap();
    store.save(&controller.snapshot()).unwrap();

    let later = now + 3_600_000;
    let restored = RangeController::from_state(FixedClock::new(later), &store.load().unwrap());
    assert_eq!(restored.mode(), RangeMode::Expr);
    assert_eq!(
        restored.resolved(),
        ResolvedRange::new(later - 7 * 86_400_000, later - 86_400_000).unwrap()
    );
}
