//! [`DashboardSource`] over a directory of captured JSON responses.
//!
//! Layout:
//!
//! ```text
//! <dir>/charts/traffic.json     [{device, stats: [{bucket, up_bytes, down_bytes}]}]
//! <dir>/charts/domains.json     [{device, stats: [{bucket, domains}]}]
//! <dir>/charts/countries.json   [{device, stats: [{bucket, countries, companies}]}]
//! <dir>/charts/protos.json      [{device, stats: [{bucket, protos}]}]
//! <dir>/tables/<kind>.json      [{device, stats: {...}}]
//! ```
//!
//! Missing chart files read as empty; a missing table file is an error so the
//! session can report it. Valid JSON of the wrong shape degrades to its
//! well-formed device items.
//! Chart buckets are scoped to the requested window.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{DashboardSource, SourceError, TableKind};
use crate::model::types::{ChartsBundle, DeviceItem, TableResponse, device_items};

#[derive(Debug, Clone)]
pub struct SnapshotSource {
    root: PathBuf,
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chart_file<T: DeserializeOwned + Default>(&self, name: &str) -> Result<Vec<DeviceItem<T>>, SourceError> {
        let path = self.root.join("charts").join(format!("{name}.json"));
        if !path.exists() {
            debug!(path = %path.display(), "chart file absent");
            return Ok(Vec::new());
        }
        Ok(device_items(read_json::<Value>(&path)?))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SourceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

impl DashboardSource for SnapshotSource {
    fn charts(&self, from_sec: i64, to_sec: i64) -> Result<ChartsBundle, SourceError> {
        let bundle = ChartsBundle {
            traffic: self.chart_file("traffic")?,
            domains: self.chart_file("domains")?,
            countries: self.chart_file("countries")?,
            protos: self.chart_file("protos")?,
        };
        Ok(bundle.scoped_to(from_sec, to_sec))
    }

    fn table(&self, kind: TableKind, _from_sec: i64, _to_sec: i64) -> Result<TableResponse, SourceError> {
        let path = self.root.join("tables").join(format!("{kind}.json"));
        let raw: Value = read_json(&path)?;
        Ok(match kind {
            TableKind::Traffic => TableResponse::Traffic(device_items(raw)),
            TableKind::Domains => TableResponse::Domains(device_items(raw)),
            TableKind::Countries => TableResponse::Countries(device_items(raw)),
            TableKind::Protos => TableResponse::Protos(device_items(raw)),
        })
    }
}
