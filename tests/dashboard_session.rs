mod util;

use serde_json::json;
use sniffly_view::analytics::SeriesBudget;
use sniffly_view::dashboard::{DashboardSession, LoadOutcome, SnapshotSource, TableKind};
use sniffly_view::range::{FixedClock, RangeController, RangePreset};
use util::{CaptureFixture, DAY_START, TestTracing};

const MAC: &str = "aa:bb:cc:dd:ee:01";

fn fixture() -> CaptureFixture {
    CaptureFixture::new()
        .traffic(
            MAC,
            &[
                (DAY_START - 600, 999.0, 999.0),
                (DAY_START, 100.0, 1000.0),
                (DAY_START + 60, 50.0, 500.0),
                (DAY_START + 240, 10.0, 20.0),
            ],
        )
        .domains(
            MAC,
            &[
                (DAY_START, json!({"video.example": 900, "api.example": 10})),
                (DAY_START + 60, json!({"api.example": 40, "mail.example": 5, "idle.example": 0})),
            ],
        )
        .countries(
            MAC,
            &[(DAY_START, json!(["DE", "DE", "US"]), json!({"Hetzner": 2, "AWS": null}))],
        )
        .protos(MAC, &[(DAY_START, json!({"TCP": 10, "UDP": 3}))])
        .table("domains", json!([{"device": {"mac": MAC}, "stats": {"a": 5, "b": 9, "c": 1}}]))
        .table("traffic", json!([{"device": {"mac": MAC}, "stats": {"up_bytes": 160, "down_bytes": 1520}}]))
        .write()
}

fn session_at(now_sec: i64) -> DashboardSession<FixedClock> {
    let mut controller = RangeController::new(FixedClock::new(now_sec * 1000));
    controller.select_preset(RangePreset::LastHour).unwrap();
    DashboardSession::new(controller).with_table_limit(2)
}

#[test]
fn renders_views_scoped_to_the_range() {
    let capture = fixture();
    let source = SnapshotSource::new(capture.path());
    let mut session = session_at(DAY_START + 3600);

    assert_eq!(session.reload_charts(&source), LoadOutcome::Applied);
    for kind in TableKind::ALL {
        session.ensure_table(kind, &source);
    }
    let view = session.view(MAC);

    // The bucket before the range is gone; 120 and 180 are synthesized.
    let up = &view.charts.traffic[0];
    assert_eq!(up.name, "Up");
    let values: Vec<f64> = up.points.iter().map(|p| p.1).collect();
    assert_eq!(values, vec![100.0, 50.0, 0.0, 0.0, 10.0]);
    assert_eq!(up.points[0].0, DAY_START * 1000);

    // Latest bucket's keys first, largest first; all-zero key dropped.
    let names: Vec<&str> = view.charts.domains.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["api.example", "mail.example", "video.example"]);
    assert_eq!(view.charts.top_domains[0].key, "video.example");

    assert_eq!(view.charts.top_countries[0].key, "DE");
    assert_eq!(view.charts.top_countries[0].value, 2.0);
    let companies: Vec<&str> = view.charts.companies.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(companies, vec!["Hetzner"]);

    let rows: Vec<(&str, f64)> = view.tables.domains.iter().map(|r| (r.key.as_str(), r.value)).collect();
    assert_eq!(rows, vec![("b", 9.0), ("a", 5.0)]);
    assert_eq!(view.tables.traffic.map(|t| t.down_bytes), Some(1520.0));

    // countries/protos tables were never captured.
    assert_eq!(view.errors.len(), 2);
    assert!(session.table_error(TableKind::Countries).is_some());
}

#[test]
fn range_change_refetches_tables_and_drops_stale_charts() {
    let capture = fixture();
    let source = SnapshotSource::new(capture.path());
    let mut session = session_at(DAY_START + 3600);
    let tracing = TestTracing::new();
    let _guard = tracing.install();

    assert!(session.ensure_table(TableKind::Domains, &source));
    assert!(!session.ensure_table(TableKind::Domains, &source));

    let ticket = session.begin_chart_load();
    session
        .update_range(|r| r.select_preset(RangePreset::Last7Days))
        .unwrap();
    let outcome = session.complete_chart_load(ticket, Ok(Default::default()));
    assert_eq!(outcome, LoadOutcome::Stale);
    tracing.assert_contains("dropping stale chart load");

    assert!(session.table(TableKind::Domains).is_none());
    assert!(session.ensure_table(TableKind::Domains, &source));
    assert!(session.charts_stale());
    session.reload_charts(&source);
    assert!(!session.charts_stale());
    // 7 days now include the early sample.
    let view = session.view(MAC);
    assert_eq!(view.charts.traffic[0].total(), 999.0 + 160.0);
}

#[test]
fn unknown_device_yields_empty_views() {
    let capture = fixture();
    let source = SnapshotSource::new(capture.path());
    let mut session = session_at(DAY_START + 3600);
    session.reload_charts(&source);
    let view = session.view("ff:ff:ff:ff:ff:ff");
    assert!(view.charts.traffic.is_empty());
    assert!(view.charts.domains.is_empty());
    assert!(view.tables.domains.is_empty());
}

#[test]
fn tight_budget_downsamples_without_losing_mass() {
    let samples: Vec<(i64, f64, f64)> = (0..600).map(|i| (DAY_START + i * 6, 1.0, 2.0)).collect();
    let capture = CaptureFixture::new().traffic(MAC, &samples).write();
    let source = SnapshotSource::new(capture.path());
    let mut session = session_at(DAY_START + 3600).with_budget(SeriesBudget {
        max_timeline_points: 50,
        max_total_points: 200,
    });
    session.reload_charts(&source);
    let view = session.view(MAC);
    let [up, down] = view.charts.traffic.as_slice() else {
        panic!("expected up/down series");
    };
    assert!(up.len() <= 50);
    assert_eq!(up.total(), 600.0);
    assert_eq!(down.total(), 1200.0);
}

#[test]
fn malformed_device_payloads_degrade_per_device() {
    let capture = fixture();
    let other = "aa:bb:cc:dd:ee:02";
    let domains = json!([
        {"device": {"mac": MAC}, "stats": [{"bucket": DAY_START, "domains": {"video.example": 4}}]},
        {"device": {"mac": other}, "stats": null}
    ]);
    let table = json!([
        {"device": {"mac": MAC}, "stats": {"a": 5, "b": null}},
        {"device": {"mac": other}, "stats": []}
    ]);
    std::fs::write(capture.path().join("charts/domains.json"), domains.to_string()).unwrap();
    std::fs::write(capture.path().join("tables/domains.json"), table.to_string()).unwrap();

    let source = SnapshotSource::new(capture.path());
    let mut session = session_at(DAY_START + 3600);
    assert_eq!(session.reload_charts(&source), LoadOutcome::Applied);
    assert!(session.chart_error().is_none());
    session.ensure_table(TableKind::Domains, &source);
    assert!(session.table_error(TableKind::Domains).is_none());

    let view = session.view(MAC);
    assert_eq!(view.charts.domains[0].name, "video.example");
    let rows: Vec<(&str, f64)> = view.tables.domains.iter().map(|r| (r.key.as_str(), r.value)).collect();
    assert_eq!(rows, vec![("a", 5.0), ("b", 0.0)]);

    let empty = session.view(other);
    assert!(empty.charts.domains.is_empty());
    assert!(empty.tables.domains.is_empty());
}

