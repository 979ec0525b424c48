//! Wire shapes returned by the data-fetch service, and their normalization.
//!
//! Chart and table endpoints return one item per monitored device. Category
//! fields are not uniform across chart kinds (a count map on one endpoint, a
//! list of labels on another, `null` when nothing was seen), so everything is
//! normalized into [`Bucket`] / [`NumericBucket`] / [`CountMap`] here, once,
//! before any ranking or downsampling runs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::analytics::{Bucket, CountMap, NumericBucket};

// ---------------------------------------------------------------------------
// Tolerant decoding
// ---------------------------------------------------------------------------

/// Decode `T`, falling back to `T::default()` on `null` or a value of the
/// wrong shape.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        debug!(error = %err, "malformed field; using empty default");
        T::default()
    }))
}

/// Decode a per-device list. `null` or a non-array yields no items; an
/// element that is not an object is skipped.
pub fn device_items<T>(value: Value) -> Vec<DeviceItem<T>>
where
    T: DeserializeOwned + Default,
{
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Vec::new(),
        other => {
            debug!(kind = json_kind(&other), "expected a device list");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(item) => Some(item),
            Err(err) => {
                debug!(error = %err, "skipping malformed device item");
                None
            }
        })
        .collect()
}

fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<DeviceItem<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(device_items(Value::deserialize(deserializer)?))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A monitored device as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub mac: String,
    pub ip: Option<String>,
    pub label: Option<String>,
    pub hostname: Option<String>,
}

impl Device {
    /// Label, then hostname, then MAC.
    pub fn display_name(&self) -> &str {
        [&self.label, &self.hostname]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or(&self.mac)
    }
}

/// Per-device payload: `{device, stats}`. A `null` or malformed `stats`
/// reads as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned + Default"))]
pub struct DeviceItem<T> {
    #[serde(default, deserialize_with = "lenient")]
    pub device: Device,
    #[serde(default, deserialize_with = "lenient")]
    pub stats: T,
}

/// Find the item for `mac`.
pub fn find_device<'a, T>(items: &'a [DeviceItem<T>], mac: &str) -> Option<&'a DeviceItem<T>> {
    items.iter().find(|item| item.device.mac == mac)
}

// ---------------------------------------------------------------------------
// Category fields
// ---------------------------------------------------------------------------

/// A categorical field in whatever shape the endpoint sent it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryField {
    /// `{"label": count}`; `null` counts are zero.
    Counts(indexmap::IndexMap<String, Option<f64>>),
    /// `["label", "label", ...]`; each occurrence counts once.
    Labels(Vec<String>),
    /// Absent, `null`, or anything else.
    #[default]
    Missing,
    Other(serde_json::Value),
}

impl CategoryField {
    pub fn to_counts(&self) -> CountMap {
        let mut counts = CountMap::new();
        match self {
            Self::Counts(map) => {
                for (label, count) in map {
                    *counts.entry(label.clone()).or_insert(0.0) += count.unwrap_or(0.0);
                }
            }
            Self::Labels(labels) => {
                for label in labels {
                    *counts.entry(label.clone()).or_insert(0.0) += 1.0;
                }
            }
            Self::Missing | Self::Other(_) => {}
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Chart buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficBucketWire {
    pub bucket: i64,
    pub up_bytes: Option<f64>,
    pub down_bytes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_count: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainBucketWire {
    pub bucket: i64,
    pub domains: CategoryField,
    pub req_count: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryBucketWire {
    pub bucket: i64,
    pub countries: CategoryField,
    pub companies: CategoryField,
    pub req_count: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoBucketWire {
    pub bucket: i64,
    pub protos: CategoryField,
    pub req_count: Option<f64>,
}

pub type TrafficChart = Vec<DeviceItem<Vec<TrafficBucketWire>>>;
pub type DomainChart = Vec<DeviceItem<Vec<DomainBucketWire>>>;
pub type CountryChart = Vec<DeviceItem<Vec<CountryBucketWire>>>;
pub type ProtoChart = Vec<DeviceItem<Vec<ProtoBucketWire>>>;

/// Everything one chart refresh returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsBundle {
    #[serde(deserialize_with = "lenient_items")]
    pub traffic: TrafficChart,
    #[serde(deserialize_with = "lenient_items")]
    pub domains: DomainChart,
    #[serde(deserialize_with = "lenient_items")]
    pub countries: CountryChart,
    #[serde(deserialize_with = "lenient_items")]
    pub protos: ProtoChart,
}

impl ChartsBundle {
    /// Drop buckets outside `[from_sec, to_sec)`; devices left with no bucket
    /// are dropped too.
    pub fn scoped_to(mut self, from_sec: i64, to_sec: i64) -> Self {
        fn scope<B>(items: &mut Vec<DeviceItem<Vec<B>>>, ts: impl Fn(&B) -> i64, from: i64, to: i64) {
            for item in items.iter_mut() {
                item.stats.retain(|b| (from..to).contains(&ts(b)));
            }
            items.retain(|item| !item.stats.is_empty());
        }
        scope(&mut self.traffic, |b| b.bucket, from_sec, to_sec);
        scope(&mut self.domains, |b| b.bucket, from_sec, to_sec);
        scope(&mut self.countries, |b| b.bucket, from_sec, to_sec);
        scope(&mut self.protos, |b| b.bucket, from_sec, to_sec);
        self
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficTotals {
    #[serde(deserialize_with = "lenient")]
    pub up_bytes: f64,
    #[serde(deserialize_with = "lenient")]
    pub down_bytes: f64,
}

/// Category tables take the same shapes as chart category fields; normalize
/// with [`CategoryField::to_counts`].
pub type CategoryTable = Vec<DeviceItem<CategoryField>>;
pub type TrafficTable = Vec<DeviceItem<TrafficTotals>>;

/// One table response, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "items")]
pub enum TableResponse {
    Traffic(TrafficTable),
    Domains(CategoryTable),
    Countries(CategoryTable),
    Protos(CategoryTable),
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonical numeric buckets; negative timestamps are dropped.
pub fn traffic_buckets(stats: &[TrafficBucketWire]) -> Vec<NumericBucket> {
    stats
        .iter()
        .filter(|b| b.bucket >= 0)
        .map(|b| NumericBucket {
            timestamp_sec: b.bucket,
            up: b.up_bytes.unwrap_or(0.0),
            down: b.down_bytes.unwrap_or(0.0),
        })
        .collect()
}

/// Canonical categorical buckets from any bucket kind, using `field` to pick
/// the category; negative timestamps are dropped.
pub fn category_buckets<B>(
    stats: &[B],
    ts: impl Fn(&B) -> i64,
    field: impl Fn(&B) -> &CategoryField,
) -> Vec<Bucket> {
    stats
        .iter()
        .filter(|b| ts(b) >= 0)
        .map(|b| Bucket::new(ts(b), field(b).to_counts()))
        .collect()
}

pub fn domain_buckets(stats: &[DomainBucketWire]) -> Vec<Bucket> {
    category_buckets(stats, |b| b.bucket, |b| &b.domains)
}

pub fn country_buckets(stats: &[CountryBucketWire]) -> Vec<Bucket> {
    category_buckets(stats, |b| b.bucket, |b| &b.countries)
}

pub fn company_buckets(stats: &[CountryBucketWire]) -> Vec<Bucket> {
    category_buckets(stats, |b| b.bucket, |b| &b.companies)
}

pub fn proto_buckets(stats: &[ProtoBucketWire]) -> Vec<Bucket> {
    category_buckets(stats, |b| b.bucket, |b| &b.protos)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
