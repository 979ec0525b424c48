//! Configuration for the `sniffly-view` CLI.
//!
//! Read from `~/.config/sniffly/config.toml` (or the XDG equivalent), then
//! overridden by environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `SNIFFLY_DATA_DIR` | `data_dir` |
//! | `SNIFFLY_STATE_PATH` | `state_path` |
//! | `SNIFFLY_TABLE_LIMIT` | `table_limit` |
//!
//! ```toml
//! data_dir = "/var/lib/sniffly/capture"
//! default_preset = "6h"
//! table_limit = 30
//!
//! [budget]
//! max_timeline_points = 1200
//! max_total_points = 40000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::analytics::{DEFAULT_TABLE_LIMIT, SeriesBudget};
use crate::range::RangePreset;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_timeline_points: usize,
    pub max_total_points: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let budget = SeriesBudget::default();
        Self {
            max_timeline_points: budget.max_timeline_points,
            max_total_points: budget.max_total_points,
        }
    }
}

impl From<BudgetConfig> for SeriesBudget {
    fn from(cfg: BudgetConfig) -> Self {
        SeriesBudget {
            max_timeline_points: cfg.max_timeline_points,
            max_total_points: cfg.max_total_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Snapshot directory used by `render` when `--data` is not given.
    pub data_dir: Option<PathBuf>,
    /// Where the range selection is persisted.
    pub state_path: Option<PathBuf>,
    pub default_preset: RangePreset,
    pub table_limit: usize,
    pub budget: BudgetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            state_path: None,
            default_preset: RangePreset::default(),
            table_limit: DEFAULT_TABLE_LIMIT,
            budget: BudgetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default location and apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(None)
    }

    /// Load `path` (or the default location) and apply environment overrides.
    pub fn load_at(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };
        Self::load_with(&path, |key| dotenvy::var(key).ok())
    }

    fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a specific file, without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/sniffly/config.toml`, falling back to the platform
    /// config directory.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("sniffly").join("config.toml"));
        }
        dirs::config_dir()
            .map(|p| p.join("sniffly").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Apply `SNIFFLY_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("SNIFFLY_DATA_DIR").filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("SNIFFLY_STATE_PATH").filter(|v| !v.is_empty()) {
            self.state_path = Some(PathBuf::from(path));
        }
        if let Some(limit) = lookup("SNIFFLY_TABLE_LIMIT") {
            self.table_limit = limit.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("SNIFFLY_TABLE_LIMIT must be a positive integer, got `{limit}`"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_limit == 0 {
            return Err(ConfigError::Validation("table_limit must be at least 1".into()));
        }
        if self.budget.max_timeline_points < 2 {
            return Err(ConfigError::Validation(
                "budget.max_timeline_points must be at least 2".into(),
            ));
        }
        if self.budget.max_total_points < self.budget.max_timeline_points {
            return Err(ConfigError::Validation(
                "budget.max_total_points must be >= budget.max_timeline_points".into(),
            ));
        }
        Ok(())
    }

    pub fn series_budget(&self) -> SeriesBudget {
        self.budget.into()
    }
}
