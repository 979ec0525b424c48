//! Derived dashboard views for one selected device.
//!
//! Each view is recomputed from scratch from the current chart/table data and
//! the selected MAC; nothing here keeps state. An unknown device simply yields
//! empty views.

use serde::Serialize;

use super::gaps::GapFiller;
use super::series::{BucketSeriesBuilder, latest_bucket_keys};
use super::top::{DEFAULT_TABLE_LIMIT, aggregate_top, top_k};
use super::types::{Bucket, Series, SeriesBudget, TopRow};
use crate::model::types::{
    CategoryTable, ChartsBundle, TrafficTable, TrafficTotals, company_buckets, country_buckets,
    domain_buckets, find_device, proto_buckets, traffic_buckets,
};

/// Row limits for the "top in chart range" widgets.
const TOP_DOMAINS_CHART: usize = 12;
const TOP_COUNTRIES_CHART: usize = 10;
const TOP_PROTOS_CHART: usize = 10;

/// Series-count rule for one categorical timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesLimit {
    /// Always exactly this many candidates.
    Fixed(usize),
    /// `min(ceiling, max(floor, preferred.len()))`: grows with the latest
    /// bucket's breadth, within bounds.
    Adaptive { floor: usize, ceiling: usize },
}

impl SeriesLimit {
    pub fn resolve(self, preferred: usize) -> usize {
        match self {
            Self::Fixed(n) => n,
            Self::Adaptive { floor, ceiling } => preferred.max(floor).min(ceiling),
        }
    }
}

pub const DOMAINS_LIMIT: SeriesLimit = SeriesLimit::Fixed(12);
pub const COUNTRIES_LIMIT: SeriesLimit = SeriesLimit::Adaptive {
    floor: 20,
    ceiling: 30,
};
pub const COMPANIES_LIMIT: SeriesLimit = COUNTRIES_LIMIT;
pub const PROTOS_LIMIT: SeriesLimit = SeriesLimit::Adaptive {
    floor: 16,
    ceiling: 24,
};

/// Timeline for one category: preferred keys are the newest bucket's keys,
/// `top_n` and `max_series` both follow `limit`.
pub fn category_timeline(buckets: &[Bucket], limit: SeriesLimit, budget: SeriesBudget) -> Vec<Series> {
    let preferred = latest_bucket_keys(buckets);
    let n = limit.resolve(preferred.len());
    BucketSeriesBuilder::new()
        .top_n(n)
        .max_series(n)
        .preferred_keys(preferred)
        .budget(budget)
        .build(buckets)
}

// ---------------------------------------------------------------------------
// Chart views
// ---------------------------------------------------------------------------

/// Chart-side views for one device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartViews {
    pub traffic: Vec<Series>,
    pub domains: Vec<Series>,
    pub countries: Vec<Series>,
    pub companies: Vec<Series>,
    pub protos: Vec<Series>,
    pub top_domains: Vec<TopRow>,
    pub top_countries: Vec<TopRow>,
    pub top_protos: Vec<TopRow>,
}

/// Build every chart view for `mac`.
pub fn chart_views(charts: &ChartsBundle, mac: &str, budget: SeriesBudget) -> ChartViews {
    let traffic = find_device(&charts.traffic, mac)
        .map(|item| GapFiller::new(budget).traffic_series(&traffic_buckets(&item.stats)))
        .unwrap_or_default();

    let domains = find_device(&charts.domains, mac)
        .map(|item| domain_buckets(&item.stats))
        .unwrap_or_default();
    let (countries, companies) = find_device(&charts.countries, mac)
        .map(|item| (country_buckets(&item.stats), company_buckets(&item.stats)))
        .unwrap_or_default();
    let protos = find_device(&charts.protos, mac)
        .map(|item| proto_buckets(&item.stats))
        .unwrap_or_default();

    ChartViews {
        traffic,
        domains: category_timeline(&domains, DOMAINS_LIMIT, budget),
        countries: category_timeline(&countries, COUNTRIES_LIMIT, budget),
        companies: category_timeline(&companies, COMPANIES_LIMIT, budget),
        protos: category_timeline(&protos, PROTOS_LIMIT, budget),
        top_domains: aggregate_top(&domains, TOP_DOMAINS_CHART),
        top_countries: aggregate_top(&countries, TOP_COUNTRIES_CHART),
        top_protos: aggregate_top(&protos, TOP_PROTOS_CHART),
    }
}

// ---------------------------------------------------------------------------
// Table views
// ---------------------------------------------------------------------------

/// Table rows for a device from one category table.
pub fn table_rows(table: Option<&CategoryTable>, mac: &str, limit: usize) -> Vec<TopRow> {
    let counts = table
        .and_then(|items| find_device(items, mac))
        .map(|item| item.stats.to_counts());
    top_k(counts.as_ref(), limit)
}

pub fn traffic_totals(table: Option<&TrafficTable>, mac: &str) -> Option<TrafficTotals> {
    table
        .and_then(|items| find_device(items, mac))
        .map(|item| item.stats)
}

/// Table-side views for one device; `None` tables have not been loaded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableViews {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic: Option<TrafficTotals>,
    pub domains: Vec<TopRow>,
    pub countries: Vec<TopRow>,
    pub protos: Vec<TopRow>,
}

pub struct TableSources<'a> {
    pub traffic: Option<&'a TrafficTable>,
    pub domains: Option<&'a CategoryTable>,
    pub countries: Option<&'a CategoryTable>,
    pub protos: Option<&'a CategoryTable>,
}

pub fn table_views(tables: &TableSources<'_>, mac: &str, limit: Option<usize>) -> TableViews {
    let limit = limit.unwrap_or(DEFAULT_TABLE_LIMIT);
    TableViews {
        traffic: traffic_totals(tables.traffic, mac),
        domains: table_rows(tables.domains, mac, limit),
        countries: table_rows(tables.countries, mac, limit),
        protos: table_rows(tables.protos, mac, limit),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> ChartsBundle {
        serde_json::from_str(
            r#"{
              "traffic": [{"device": {"mac": "aa"}, "stats": [
                  {"bucket": 0, "up_bytes": 10, "down_bytes": 100},
                  {"bucket": 180, "up_bytes": 5, "down_bytes": 50},
                  {"bucket": 60, "up_bytes": 1, "down_bytes": 1},
                  {"bucket": 240, "up_bytes": 1, "down_bytes": 1}
              ]}],
              "domains": [{"device": {"mac": "aa"}, "stats": [
                  {"bucket": 0, "domains": {"old.example": 50, "cdn.example": 1}},
                  {"bucket": 60, "domains": {"new.example": 2, "cdn.example": 1}}
              ]}],
              "countries": [{"device": {"mac": "aa"}, "stats": [
                  {"bucket": 0, "countries": ["DE", "DE", "FR"], "companies": {"Hetzner": 2}}
              ]}],
              "protos": [{"device": {"mac": "aa"}, "stats": [
                  {"bucket": 0, "protos": {"TCP": 3, "UDP": 0}}
              ]}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn adaptive_limits_clamp() {
        assert_eq!(COUNTRIES_LIMIT.resolve(3), 20);
        assert_eq!(COUNTRIES_LIMIT.resolve(25), 25);
        assert_eq!(COUNTRIES_LIMIT.resolve(99), 30);
        assert_eq!(PROTOS_LIMIT.resolve(0), 16);
        assert_eq!(DOMAINS_LIMIT.resolve(40), 12);
    }

    #[test]
    fn chart_views_for_known_device() {
        let views = chart_views(&bundle(), "aa", SeriesBudget::default());
        assert_eq!(views.traffic.len(), 2);
        // 120 is synthesized between 60 and 180.
        assert_eq!(
            views.traffic[0].points,
            vec![(0, 10.0), (60_000, 1.0), (120_000, 0.0), (180_000, 5.0), (240_000, 1.0)]
        );

        // Latest bucket's keys lead the legend even though old.example is larger.
        let names: Vec<&str> = views.domains.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["new.example", "cdn.example", "old.example"]);

        assert_eq!(views.top_domains[0], TopRow::new("old.example", 50.0));
        assert_eq!(views.top_countries[0], TopRow::new("DE", 2.0));
        assert_eq!(views.companies[0].name, "Hetzner");
        // UDP never carried traffic.
        assert_eq!(views.protos.len(), 1);
    }

    #[test]
    fn unknown_device_is_empty() {
        let views = chart_views(&bundle(), "zz", SeriesBudget::default());
        assert!(views.traffic.is_empty());
        assert!(views.domains.is_empty());
        assert!(views.top_protos.is_empty());
    }

    #[test]
    fn table_views_rank_rows() {
        let domains: CategoryTable = serde_json::from_str(
            r#"[{"device": {"mac": "aa"}, "stats": {"a": 5, "b": 9, "c": 1}},
                {"device": {"mac": "bb"}, "stats": null}]"#,
        )
        .unwrap();
        let sources = TableSources {
            traffic: None,
            domains: Some(&domains),
            countries: None,
            protos: None,
        };
        let views = table_views(&sources, "aa", Some(2));
        assert_eq!(views.domains, vec![TopRow::new("b", 9.0), TopRow::new("a", 5.0)]);
        assert!(views.countries.is_empty());
        assert!(table_views(&sources, "bb", None).domains.is_empty());
    }
}
