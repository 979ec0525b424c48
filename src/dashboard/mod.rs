//! Dashboard session: the active range, the data fetched for it, and the
//! per-device views derived from that data.
//!
//! Fetching is delegated to a [`DashboardSource`]. Chart loads carry a
//! [`LoadTicket`] stamped with the range generation they were issued for; a
//! result whose generation is no longer current is dropped instead of
//! overwriting newer data. Tables are fetched lazily, at most once per range
//! generation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sniffly_view::dashboard::{DashboardSession, SnapshotSource, TableKind};
//! use sniffly_view::range::{RangeController, SystemClock};
//!
//! let source = SnapshotSource::new("./capture");
//! let mut session = DashboardSession::new(RangeController::new(SystemClock));
//! session.reload_charts(&source);
//! session.ensure_table(TableKind::Domains, &source);
//! let view = session.view("aa:bb:cc:dd:ee:ff");
//! ```

pub mod snapshot;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analytics::derive::{TableSources, chart_views, table_views};
use crate::analytics::{ChartViews, SeriesBudget, TableViews};
use crate::model::types::{CategoryTable, ChartsBundle, TableResponse, TrafficTable};
use crate::range::{Clock, RangeController, RangeError, RangeUpdate, ResolvedRange};

pub use snapshot::SnapshotSource;

// ---------------------------------------------------------------------------
// Source boundary
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Which table a fetch refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Traffic,
    Domains,
    Countries,
    Protos,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [Self::Traffic, Self::Domains, Self::Countries, Self::Protos];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Domains => "domains",
            Self::Countries => "countries",
            Self::Protos => "protos",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier of chart and table data for a `[from_sec, to_sec)` window.
pub trait DashboardSource {
    fn charts(&self, from_sec: i64, to_sec: i64) -> Result<ChartsBundle, SourceError>;
    fn table(&self, kind: TableKind, from_sec: i64, to_sec: i64) -> Result<TableResponse, SourceError>;
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Identifies one chart fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub from_sec: i64,
    pub to_sec: i64,
}

/// What happened to a completed chart load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    Failed,
    /// The range moved on after the ticket was issued.
    Stale,
}

#[derive(Debug)]
struct CachedTable {
    generation: u64,
    response: TableResponse,
}

/// Everything the dashboard shows for one device.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub range: ResolvedRange,
    pub generation: u64,
    pub charts_stale: bool,
    pub charts: ChartViews,
    pub tables: TableViews,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

pub struct DashboardSession<C: Clock> {
    range: RangeController<C>,
    budget: SeriesBudget,
    table_limit: Option<usize>,
    charts: ChartsBundle,
    charts_generation: Option<u64>,
    chart_error: Option<String>,
    tables: HashMap<TableKind, CachedTable>,
    table_errors: HashMap<TableKind, String>,
}

impl<C: Clock> DashboardSession<C> {
    pub fn new(range: RangeController<C>) -> Self {
        Self {
            range,
            budget: SeriesBudget::default(),
            table_limit: None,
            charts: ChartsBundle::default(),
            charts_generation: None,
            chart_error: None,
            tables: HashMap::new(),
            table_errors: HashMap::new(),
        }
    }

    pub fn with_budget(mut self, budget: SeriesBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_table_limit(mut self, limit: usize) -> Self {
        self.table_limit = Some(limit);
        self
    }

    pub fn range(&self) -> &RangeController<C> {
        &self.range
    }

    pub fn charts(&self) -> &ChartsBundle {
        &self.charts
    }

    /// True until a chart load for the current generation has been applied.
    pub fn charts_stale(&self) -> bool {
        self.charts_generation != Some(self.range.generation())
    }

    pub fn chart_error(&self) -> Option<&str> {
        self.chart_error.as_deref()
    }

    pub fn table_error(&self, kind: TableKind) -> Option<&str> {
        self.table_errors.get(&kind).map(String::as_str)
    }

    pub fn table(&self, kind: TableKind) -> Option<&TableResponse> {
        self.tables.get(&kind).map(|cached| &cached.response)
    }

    // -- range ---------------------------------------------------------------

    /// Run a controller operation and invalidate caches if the range moved.
    pub fn update_range(
        &mut self,
        op: impl FnOnce(&mut RangeController<C>) -> Result<RangeUpdate, RangeError>,
    ) -> Result<RangeUpdate, RangeError> {
        let update = op(&mut self.range)?;
        if let RangeUpdate::Changed { generation, .. } = update {
            debug!(generation, "range changed; dropping table cache");
            self.tables.clear();
            self.table_errors.clear();
            self.chart_error = None;
        }
        Ok(update)
    }

    // -- charts --------------------------------------------------------------

    pub fn begin_chart_load(&self) -> LoadTicket {
        LoadTicket {
            generation: self.range.generation(),
            from_sec: self.range.from_seconds(),
            to_sec: self.range.to_seconds(),
        }
    }

    pub fn complete_chart_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ChartsBundle, SourceError>,
    ) -> LoadOutcome {
        if ticket.generation != self.range.generation() {
            warn!(
                ticket = ticket.generation,
                current = self.range.generation(),
                "dropping stale chart load"
            );
            return LoadOutcome::Stale;
        }
        match result {
            Ok(charts) => {
                self.charts = charts;
                self.charts_generation = Some(ticket.generation);
                self.chart_error = None;
                LoadOutcome::Applied
            }
            Err(err) => {
                self.chart_error = Some(err.to_string());
                LoadOutcome::Failed
            }
        }
    }

    pub fn reload_charts(&mut self, source: &impl DashboardSource) -> LoadOutcome {
        let ticket = self.begin_chart_load();
        let result = source.charts(ticket.from_sec, ticket.to_sec);
        self.complete_chart_load(ticket, result)
    }

    // -- tables --------------------------------------------------------------

    /// Fetch `kind` unless it is already cached for the current range.
    /// Returns whether a fetch happened.
    pub fn ensure_table(&mut self, kind: TableKind, source: &impl DashboardSource) -> bool {
        let generation = self.range.generation();
        if self.tables.get(&kind).is_some_and(|c| c.generation == generation) {
            return false;
        }
        match source.table(kind, self.range.from_seconds(), self.range.to_seconds()) {
            Ok(response) => {
                self.tables.insert(kind, CachedTable { generation, response });
                self.table_errors.remove(&kind);
            }
            Err(err) => {
                warn!(table = %kind, error = %err, "table load failed");
                self.table_errors.insert(kind, err.to_string());
            }
        }
        true
    }

    // -- views ---------------------------------------------------------------

    pub fn view(&self, mac: &str) -> DashboardView {
        let mut errors: Vec<String> = self.range.error().map(str::to_string).into_iter().collect();
        errors.extend(self.chart_error.clone());
        for kind in TableKind::ALL {
            if let Some(err) = self.table_errors.get(&kind) {
                errors.push(format!("{kind}: {err}"));
            }
        }

        let sources = TableSources {
            traffic: self.traffic_table(),
            domains: self.category_table(TableKind::Domains),
            countries: self.category_table(TableKind::Countries),
            protos: self.category_table(TableKind::Protos),
        };

        DashboardView {
            range: self.range.resolved(),
            generation: self.range.generation(),
            charts_stale: self.charts_stale(),
            charts: chart_views(&self.charts, mac, self.budget),
            tables: table_views(&sources, mac, self.table_limit),
            errors,
        }
    }

    fn traffic_table(&self) -> Option<&TrafficTable> {
        match self.table(TableKind::Traffic) {
            Some(TableResponse::Traffic(items)) => Some(items),
            _ => None,
        }
    }

    fn category_table(&self, kind: TableKind) -> Option<&CategoryTable> {
        match (kind, self.table(kind)?) {
            (TableKind::Domains, TableResponse::Domains(items))
            | (TableKind::Countries, TableResponse::Countries(items))
            | (TableKind::Protos, TableResponse::Protos(items)) => Some(items),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
