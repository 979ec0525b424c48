//! Persisted range selection.
//!
//! The snapshot is a small JSON document. Loading is tolerant: a missing,
//! unreadable or malformed file yields `None` and the caller starts from the
//! defaults. Saving reports errors so the CLI can surface them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::controller::{RangeMode, RangePreset};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to write range state to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode range state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything needed to restore the range selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedRangeState {
    pub v: u32,
    pub preset: RangePreset,
    pub range_mode: RangeMode,
    pub from_expr: String,
    pub to_expr: String,
    pub absolute_from_ms: Option<i64>,
    pub absolute_to_ms: Option<i64>,
}

impl PersistedRangeState {
    pub const VERSION: u32 = 1;
}

impl Default for PersistedRangeState {
    fn default() -> Self {
        Self {
            v: Self::VERSION,
            preset: RangePreset::default(),
            range_mode: RangeMode::default(),
            from_expr: "now-24h".to_string(),
            to_expr: "now".to_string(),
            absolute_from_ms: None,
            absolute_to_ms: None,
        }
    }
}

/// Where range snapshots live between sessions.
pub trait PreferenceStore {
    fn load(&self) -> Option<PersistedRangeState>;
    fn save(&self, state: &PersistedRangeState) -> Result<(), StateError>;
}

/// Snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFileStore {
    fn load(&self) -> Option<PersistedRangeState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read range state");
                return None;
            }
        };
        match serde_json::from_str::<PersistedRangeState>(&raw) {
            Ok(state) if state.v == PersistedRangeState::VERSION => Some(state),
            Ok(state) => {
                debug!(version = state.v, "ignoring range state with unknown version");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "malformed range state");
                None
            }
        }
    }

    fn save(&self, state: &PersistedRangeState) -> Result<(), StateError> {
        let body = serde_json::to_string_pretty(state)?;
        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, body.as_bytes())?;
            std::fs::rename(&tmp, path)
        };
        write(&self.path).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
