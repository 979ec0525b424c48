//! Time-range resolution and bounded chart series for the sniffly traffic
//! dashboard.
//!
//! - [`range`] turns `now-24h`-style expressions into concrete windows and
//!   tracks the active selection.
//! - [`analytics`] reshapes bucketed traffic samples into bounded,
//!   legend-stable chart series and ranked table rows.
//! - [`dashboard`] ties a range to a data source and derives per-device views.
//!
//! The binary (`sniffly-view`) exposes the same pipeline over captured JSON
//! responses.

pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod format;
pub mod model;
pub mod range;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};

use crate::analytics::validate::{ValidateConfig, ValidationReport, validate_categorical, validate_counter};
use crate::analytics::{DEFAULT_TABLE_LIMIT, top_k};
use crate::config::AppConfig;
use crate::dashboard::{DashboardSession, DashboardView, SnapshotSource, TableKind};
use crate::format::{format_bytes, format_compact, format_datetime, format_number};
use crate::model::types::{
    CategoryField, ChartsBundle, Device, company_buckets, country_buckets, domain_buckets, find_device,
    proto_buckets, traffic_buckets,
};
use crate::range::{
    Clock, JsonFileStore, PersistedRangeState, PreferenceStore, RangeController, RangeError, RangePreset,
    ResolvedRange, SystemClock, resolve_range,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "sniffly-view", version, about = "Resolve dashboard time ranges and render bounded chart series")]
pub struct Cli {
    /// Emit machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: $XDG_CONFIG_HOME/sniffly/config.toml).
    #[arg(long, global = true, env = "SNIFFLY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a pair of time expressions to epoch milliseconds.
    Resolve {
        /// Start: `now-24h`, 10/13-digit unix time, or ISO-8601.
        from: String,
        /// End.
        #[arg(default_value = "now")]
        to: String,
        /// Instant that `now` refers to, in epoch ms (default: current time).
        #[arg(long)]
        base_ms: Option<i64>,
    },

    /// Render per-device chart series and table rows from a capture directory.
    Render {
        /// Capture directory with `charts/` and `tables/`.
        #[arg(long)]
        data: Option<PathBuf>,
        /// Device MAC (default: first device in the charts).
        #[arg(long)]
        mac: Option<String>,
        /// Quick range: 1h, 6h, 24h or 7d.
        #[arg(long, conflicts_with_all = ["from", "abs_from"])]
        preset: Option<RangePreset>,
        #[arg(long, requires = "to", conflicts_with = "abs_from")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Absolute start in epoch ms.
        #[arg(long, requires = "abs_to")]
        abs_from: Option<i64>,
        #[arg(long, requires = "abs_from")]
        abs_to: Option<i64>,
        /// Persisted range selection (read, and written back on change).
        #[arg(long)]
        state: Option<PathBuf>,
        /// Check point budgets and mass preservation of the output.
        #[arg(long)]
        validate: bool,
        /// Pin `now` to this epoch ms.
        #[arg(long, hide = true)]
        now_ms: Option<i64>,
    },

    /// Rank a `{key: count}` map (or a list of labels) from a JSON file.
    Top {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub struct ParsedCli {
    pub cli: Cli,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error surfaced to the user; `code` is the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

impl CliError {
    fn new(code: i32, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn usage(message: impl Into<String>) -> Self {
        Self::new(2, "usage", message)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "kind": self.kind,
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
            }
        })
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\nhint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CliError {}

impl From<RangeError> for CliError {
    fn from(err: RangeError) -> Self {
        Self::new(4, "range", err.to_string())
            .with_hint("expressions look like now-24h, now-1y+6m, 1705276800, or 2024-01-15T00:00Z")
    }
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        Self::new(3, "config", err.to_string())
    }
}

impl From<dashboard::SourceError> for CliError {
    fn from(err: dashboard::SourceError) -> Self {
        let mut cli = Self::new(6, "source", err.to_string());
        cli.retryable = matches!(err, dashboard::SourceError::Io { .. });
        cli
    }
}

impl From<range::state::StateError> for CliError {
    fn from(err: range::state::StateError) -> Self {
        Self::new(7, "state", err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse arguments. Help and version requests are printed here and come back
/// as an error with code 0.
pub fn parse_cli<I, T>(args: I) -> Result<ParsedCli, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(ParsedCli { cli }),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                let _ = err.print();
                Err(CliError::new(0, "help", ""))
            }
            _ => Err(CliError::usage(err.render().to_string())),
        },
    }
}

pub fn run_with_parsed(parsed: ParsedCli) -> Result<(), CliError> {
    let Cli { json, config, command } = parsed.cli;
    match command {
        Commands::Resolve { from, to, base_ms } => run_resolve(&from, &to, base_ms, json),
        Commands::Top { file, limit } => run_top(&file, limit, json),
        Commands::Render {
            data,
            mac,
            preset,
            from,
            to,
            abs_from,
            abs_to,
            state,
            validate,
            now_ms,
        } => {
            let cfg = load_config(config)?;
            let selection = match (preset, from.zip(to), abs_from.zip(abs_to)) {
                (Some(p), _, _) => Selection::Preset(p),
                (_, Some((f, t)), _) => Selection::Expressions(f, t),
                (_, _, Some((f, t))) => Selection::Absolute(f, t),
                _ => Selection::Persisted,
            };
            let opts = RenderOptions {
                data,
                mac,
                selection,
                state,
                validate,
                clock: CliClock(now_ms),
            };
            run_render(&cfg, opts, json)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, CliError> {
    Ok(AppConfig::load_at(path.as_deref())?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(1, "internal", format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ResolveOutput {
    from_ms: i64,
    to_ms: i64,
    from_seconds: i64,
    to_seconds: i64,
    from: String,
    to: String,
}

fn run_resolve(from: &str, to: &str, base_ms: Option<i64>, json: bool) -> Result<(), CliError> {
    let base = base_ms.unwrap_or_else(|| SystemClock.now_ms());
    let range = resolve_range(from, to, base)?;
    let out = ResolveOutput {
        from_ms: range.from_ms(),
        to_ms: range.to_ms(),
        from_seconds: range.from_seconds(),
        to_seconds: range.to_seconds(),
        from: format_datetime(range.from_ms() as f64),
        to: format_datetime(range.to_ms() as f64),
    };
    if json {
        return print_json(&out);
    }
    println!("from  {}  ({})", out.from_ms, out.from);
    println!("to    {}  ({})", out.to_ms, out.to);
    Ok(())
}

// ---------------------------------------------------------------------------
// top
// ---------------------------------------------------------------------------

fn run_top(file: &Path, limit: Option<usize>, json: bool) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(file).map_err(|e| {
        CliError::new(6, "source", format!("failed to read {}: {e}", file.display()))
    })?;
    let field: CategoryField = serde_json::from_str(&raw).map_err(|e| {
        CliError::new(6, "source", format!("failed to decode {}: {e}", file.display()))
    })?;
    let rows = top_k(Some(&field.to_counts()), limit.unwrap_or(DEFAULT_TABLE_LIMIT));
    if json {
        return print_json(&rows);
    }
    let width = rows.iter().map(|r| r.key.chars().count()).max().unwrap_or(0);
    for row in &rows {
        println!("{:<width$}  {}", row.key, format_number(row.value));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

/// Wall clock unless pinned with `--now-ms`.
struct CliClock(Option<i64>);

impl Clock for CliClock {
    fn now_ms(&self) -> i64 {
        self.0.unwrap_or_else(|| SystemClock.now_ms())
    }
}

enum Selection {
    Persisted,
    Preset(RangePreset),
    Expressions(String, String),
    Absolute(i64, i64),
}

struct RenderOptions {
    data: Option<PathBuf>,
    mac: Option<String>,
    selection: Selection,
    state: Option<PathBuf>,
    validate: bool,
    clock: CliClock,
}

#[derive(Serialize)]
struct RenderOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<Device>,
    #[serde(flatten)]
    view: DashboardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<serde_json::Value>,
}

fn run_render(cfg: &AppConfig, opts: RenderOptions, json: bool) -> Result<(), CliError> {
    let data_dir = opts.data.or_else(|| cfg.data_dir.clone()).ok_or_else(|| {
        CliError::usage("no capture directory given").with_hint("pass --data DIR or set SNIFFLY_DATA_DIR")
    })?;
    if !data_dir.is_dir() {
        return Err(CliError::new(
            6,
            "source",
            format!("capture directory {} does not exist", data_dir.display()),
        ));
    }

    let store = opts.state.or_else(|| cfg.state_path.clone()).map(JsonFileStore::new);
    let persisted = store.as_ref().and_then(|s| s.load()).unwrap_or_else(|| PersistedRangeState {
        preset: cfg.default_preset,
        ..Default::default()
    });

    let mut controller = RangeController::from_state(opts.clock, &persisted);
    match opts.selection {
        Selection::Persisted => {}
        Selection::Preset(p) => {
            controller.select_preset(p)?;
        }
        Selection::Expressions(from, to) => {
            controller.apply_expressions(&from, &to)?;
        }
        Selection::Absolute(from, to) => {
            controller.apply_absolute(from, to)?;
        }
    }
    if let Some(store) = &store {
        let snapshot = controller.snapshot();
        if store.load().as_ref() != Some(&snapshot) {
            store.save(&snapshot)?;
            debug!(path = %store.path().display(), "saved range state");
        }
    }

    let source = SnapshotSource::new(&data_dir);
    let mut session = DashboardSession::new(controller)
        .with_budget(cfg.series_budget())
        .with_table_limit(cfg.table_limit);
    session.reload_charts(&source);
    if let Some(err) = session.chart_error() {
        return Err(CliError::new(6, "source", err.to_string()));
    }
    for kind in TableKind::ALL {
        session.ensure_table(kind, &source);
    }

    let device = match opts.mac {
        Some(mac) => Some(device_in(session.charts(), &mac).unwrap_or(Device {
            mac,
            ..Default::default()
        })),
        None => first_device(session.charts()),
    };
    let mac = device.as_ref().map(|d| d.mac.clone()).unwrap_or_default();
    let view = session.view(&mac);

    let report = opts.validate.then(|| {
        validate_view(
            session.charts(),
            &mac,
            &view,
            &ValidateConfig {
                budget: cfg.series_budget(),
                ..Default::default()
            },
        )
    });

    let failed = report.as_ref().is_some_and(|r| !r.all_ok());
    if json {
        print_json(&RenderOutput {
            device,
            view,
            validation: report.as_ref().map(ValidationReport::to_json),
        })?;
    } else {
        print_view(device.as_ref(), &view, report.as_ref());
    }
    if failed {
        return Err(CliError::new(5, "validation", "output failed validation"));
    }
    Ok(())
}

fn device_in(charts: &ChartsBundle, mac: &str) -> Option<Device> {
    find_device(&charts.traffic, mac)
        .map(|i| i.device.clone())
        .or_else(|| find_device(&charts.domains, mac).map(|i| i.device.clone()))
        .or_else(|| find_device(&charts.countries, mac).map(|i| i.device.clone()))
        .or_else(|| find_device(&charts.protos, mac).map(|i| i.device.clone()))
}

fn first_device(charts: &ChartsBundle) -> Option<Device> {
    charts
        .traffic
        .first()
        .map(|i| &i.device)
        .or_else(|| charts.domains.first().map(|i| &i.device))
        .or_else(|| charts.countries.first().map(|i| &i.device))
        .or_else(|| charts.protos.first().map(|i| &i.device))
        .cloned()
}

fn validate_view(charts: &ChartsBundle, mac: &str, view: &DashboardView, cfg: &ValidateConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if let Some(item) = find_device(&charts.traffic, mac) {
        let raw = traffic_buckets(&item.stats);
        let up: Vec<(i64, f64)> = raw.iter().map(|b| (b.timestamp_sec, b.up)).collect();
        let down: Vec<(i64, f64)> = raw.iter().map(|b| (b.timestamp_sec, b.down)).collect();
        if let [up_series, down_series] = view.charts.traffic.as_slice() {
            report.merge(validate_counter("traffic.up", &up, up_series, cfg));
            report.merge(validate_counter("traffic.down", &down, down_series, cfg));
        }
    }
    if let Some(item) = find_device(&charts.domains, mac) {
        let raw = domain_buckets(&item.stats);
        report.merge(validate_categorical("domains", &raw, &view.charts.domains, cfg));
    }
    if let Some(item) = find_device(&charts.countries, mac) {
        let countries = country_buckets(&item.stats);
        let companies = company_buckets(&item.stats);
        report.merge(validate_categorical("countries", &countries, &view.charts.countries, cfg));
        report.merge(validate_categorical("companies", &companies, &view.charts.companies, cfg));
    }
    if let Some(item) = find_device(&charts.protos, mac) {
        let raw = proto_buckets(&item.stats);
        report.merge(validate_categorical("protos", &raw, &view.charts.protos, cfg));
    }
    if !report.all_ok() {
        warn!(failures = report.checks.iter().filter(|c| !c.ok).count(), "validation failed");
    }
    report
}

fn print_view(device: Option<&Device>, view: &DashboardView, report: Option<&ValidationReport>) {
    let range: ResolvedRange = view.range;
    println!(
        "range    {} .. {}  (generation {})",
        format_datetime(range.from_ms() as f64),
        format_datetime(range.to_ms() as f64),
        view.generation
    );
    match device {
        Some(d) => println!("device   {} [{}]", d.display_name(), d.mac),
        None => println!("device   (none)"),
    }

    let charts = &view.charts;
    if let [up, down] = charts.traffic.as_slice() {
        println!(
            "traffic  up {}  down {}  ({} points)",
            format_bytes(up.total()),
            format_bytes(down.total()),
            up.len()
        );
    }
    for (label, series) in [
        ("domains", &charts.domains),
        ("countries", &charts.countries),
        ("companies", &charts.companies),
        ("protos", &charts.protos),
    ] {
        let names: Vec<String> = series
            .iter()
            .map(|s| format!("{} ({})", s.name, format_compact(s.total())))
            .collect();
        println!("{label:<9}{} series: {}", series.len(), names.join(", "));
    }

    for (label, rows) in [
        ("top domains", &charts.top_domains),
        ("top countries", &charts.top_countries),
        ("top protos", &charts.top_protos),
        ("table domains", &view.tables.domains),
        ("table countries", &view.tables.countries),
        ("table protos", &view.tables.protos),
    ] {
        if rows.is_empty() {
            continue;
        }
        println!("{label}");
        for row in rows {
            println!("  {:<32} {}", row.key, format_number(row.value));
        }
    }
    if let Some(totals) = view.tables.traffic {
        println!(
            "totals   up {}  down {}",
            format_bytes(totals.up_bytes),
            format_bytes(totals.down_bytes)
        );
    }

    for err in &view.errors {
        println!("error    {err}");
    }
    if let Some(report) = report {
        for check in report.checks.iter().filter(|c| !c.ok) {
            println!("check    FAIL {}: {}", check.id, check.details);
        }
        if report.all_ok() {
            println!("check    ok ({} checks)", report.checks.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_render_flags() {
        let parsed = parse_cli(["sniffly-view", "render", "--data", "/tmp/x", "--preset", "6h", "--json"]).unwrap();
        assert!(parsed.cli.json);
        match parsed.cli.command {
            Commands::Render { preset, .. } => assert_eq!(preset, Some(RangePreset::Last6Hours)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn conflicting_selections_are_usage_errors() {
        let err = parse_cli([
            "sniffly-view", "render", "--preset", "1h", "--from", "now-2h", "--to", "now",
        ])
        .err()
        .unwrap();
        assert_eq!(err.code, 2);
        assert_eq!(err.kind, "usage");
    }

    #[test]
    fn from_requires_to() {
        assert!(parse_cli(["sniffly-view", "render", "--from", "now-2h"]).is_err());
    }

    #[test]
    fn range_errors_carry_a_hint() {
        let err: CliError = resolve_range("bogus", "now", 0).unwrap_err().into();
        assert_eq!(err.code, 4);
        assert!(err.hint.is_some());
        assert_eq!(err.to_json()["error"]["kind"], "range");
    }
}
