//! Active time range and its selection mode.
//!
//! The controller holds the state of all three selection modes at once so a
//! UI can switch back and forth without losing what was typed; only the active
//! mode feeds the resolved range. Every change of the resolved range bumps a
//! generation counter, which downstream caches use to invalidate themselves
//! and to ignore results of fetches issued for an older range.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::expr::resolve_range;
use super::state::PersistedRangeState;
use super::{RangeError, ResolvedRange};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for relative expressions.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedClock(std::cell::Cell<i64>);

impl FixedClock {
    pub fn new(now_ms: i64) -> Self {
        Self(std::cell::Cell::new(now_ms))
    }

    pub fn set(&self, now_ms: i64) {
        self.0.set(now_ms);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.0.set(self.0.get() + delta_ms);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

// ---------------------------------------------------------------------------
// Modes and presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    #[default]
    Preset,
    Expr,
    Absolute,
}

/// Quick-select ranges ending at "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangePreset {
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "6h")]
    Last6Hours,
    #[default]
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
}

impl RangePreset {
    pub const ALL: [RangePreset; 4] = [
        Self::LastHour,
        Self::Last6Hours,
        Self::Last24Hours,
        Self::Last7Days,
    ];

    /// Canonical `from` expression; `to` is always `now`.
    pub fn from_expr(self) -> &'static str {
        match self {
            Self::LastHour => "now-1h",
            Self::Last6Hours => "now-6h",
            Self::Last24Hours => "now-24h",
            Self::Last7Days => "now-7d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LastHour => "1h",
            Self::Last6Hours => "6h",
            Self::Last24Hours => "24h",
            Self::Last7Days => "7d",
        }
    }
}

impl std::fmt::Display for RangePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RangePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.label() == s.trim())
            .ok_or_else(|| format!("unknown preset `{s}` (expected 1h, 6h, 24h or 7d)"))
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Outcome of a successful (re)resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeUpdate {
    /// The resolved range moved; dependent caches are stale.
    Changed {
        range: ResolvedRange,
        generation: u64,
    },
    /// Resolution succeeded but produced the same range.
    Unchanged,
}

impl RangeUpdate {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Owns the active range selection.
#[derive(Debug)]
pub struct RangeController<C: Clock> {
    clock: C,
    mode: RangeMode,
    preset: RangePreset,
    from_expr: String,
    to_expr: String,
    absolute_from_ms: Option<i64>,
    absolute_to_ms: Option<i64>,
    resolved: ResolvedRange,
    generation: u64,
    error: Option<String>,
}

impl<C: Clock> RangeController<C> {
    /// Default selection: preset `24h`.
    pub fn new(clock: C) -> Self {
        Self::from_state(clock, &PersistedRangeState::default())
    }

    /// Rebuild from a persisted snapshot by replaying its active mode.
    ///
    /// If the snapshot no longer resolves, the controller starts on the last
    /// 24 hours and keeps the error for display.
    pub fn from_state(clock: C, state: &PersistedRangeState) -> Self {
        let now = clock.now_ms();
        let mut controller = Self {
            clock,
            mode: RangeMode::Preset,
            preset: state.preset,
            from_expr: state.from_expr.clone(),
            to_expr: state.to_expr.clone(),
            absolute_from_ms: state.absolute_from_ms,
            absolute_to_ms: state.absolute_to_ms,
            resolved: ResolvedRange::last_day(now),
            generation: 0,
            error: None,
        };
        let replayed = match (state.range_mode, state.absolute_from_ms, state.absolute_to_ms) {
            (RangeMode::Absolute, Some(from), Some(to)) => controller.apply_absolute(from, to),
            (RangeMode::Expr, _, _) => controller.apply_expressions(&state.from_expr, &state.to_expr),
            _ => controller.select_preset(state.preset),
        };
        if let Err(err) = replayed {
            info!(error = %err, "persisted range no longer resolves; using last 24h");
        }
        controller
    }

    // -- accessors ---------------------------------------------------------

    pub fn mode(&self) -> RangeMode {
        self.mode
    }

    pub fn preset(&self) -> RangePreset {
        self.preset
    }

    pub fn from_expr(&self) -> &str {
        &self.from_expr
    }

    pub fn to_expr(&self) -> &str {
        &self.to_expr
    }

    pub fn absolute_bounds(&self) -> (Option<i64>, Option<i64>) {
        (self.absolute_from_ms, self.absolute_to_ms)
    }

    pub fn resolved(&self) -> ResolvedRange {
        self.resolved
    }

    /// Incremented on every change of the resolved range.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Message of the last failed resolution, cleared by the next success.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn from_seconds(&self) -> i64 {
        self.resolved.from_seconds()
    }

    pub fn to_seconds(&self) -> i64 {
        self.resolved.to_seconds()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // -- mode changes --------------------------------------------------------

    /// Switch to a preset and resolve it against the current instant.
    pub fn select_preset(&mut self, preset: RangePreset) -> Result<RangeUpdate, RangeError> {
        let resolved = resolve_range(preset.from_expr(), "now", self.clock.now_ms());
        self.commit(resolved, |c| {
            c.preset = preset;
            c.mode = RangeMode::Preset;
        })
    }

    /// Store and resolve two expressions. The expressions are kept even when
    /// they fail to resolve, so they can be corrected; the mode only switches
    /// on success.
    pub fn apply_expressions(&mut self, from_expr: &str, to_expr: &str) -> Result<RangeUpdate, RangeError> {
        self.from_expr = from_expr.to_string();
        self.to_expr = to_expr.to_string();
        let resolved = resolve_range(from_expr, to_expr, self.clock.now_ms());
        self.commit(resolved, |c| c.mode = RangeMode::Expr)
    }

    /// Use fixed millisecond bounds, skipping the resolver.
    pub fn apply_absolute(&mut self, from_ms: i64, to_ms: i64) -> Result<RangeUpdate, RangeError> {
        let resolved = ResolvedRange::new(from_ms, to_ms);
        self.commit(resolved, |c| {
            c.absolute_from_ms = Some(from_ms);
            c.absolute_to_ms = Some(to_ms);
            c.mode = RangeMode::Absolute;
        })
    }

    /// Switch back to a mode using its stored state.
    pub fn activate(&mut self, mode: RangeMode) -> Result<RangeUpdate, RangeError> {
        match mode {
            RangeMode::Preset => self.select_preset(self.preset),
            RangeMode::Expr => {
                let (from, to) = (self.from_expr.clone(), self.to_expr.clone());
                self.apply_expressions(&from, &to)
            }
            RangeMode::Absolute => match (self.absolute_from_ms, self.absolute_to_ms) {
                (Some(from), Some(to)) => self.apply_absolute(from, to),
                (from, to) => self.fail(RangeError::InvalidRange {
                    from_ms: from,
                    to_ms: to,
                    reason: "no absolute range selected".to_string(),
                }),
            },
        }
    }

    /// Re-resolve the active mode against the current instant.
    pub fn refresh(&mut self) -> Result<RangeUpdate, RangeError> {
        self.activate(self.mode)
    }

    /// Snapshot for persistence.
    pub fn snapshot(&self) -> PersistedRangeState {
        PersistedRangeState {
            v: PersistedRangeState::VERSION,
            preset: self.preset,
            range_mode: self.mode,
            from_expr: self.from_expr.clone(),
            to_expr: self.to_expr.clone(),
            absolute_from_ms: self.absolute_from_ms,
            absolute_to_ms: self.absolute_to_ms,
        }
    }

    fn commit(
        &mut self,
        resolved: Result<ResolvedRange, RangeError>,
        on_success: impl FnOnce(&mut Self),
    ) -> Result<RangeUpdate, RangeError> {
        let range = match resolved {
            Ok(range) => range,
            Err(err) => return self.fail(err),
        };
        self.error = None;
        on_success(self);
        if range == self.resolved && self.generation > 0 {
            return Ok(RangeUpdate::Unchanged);
        }
        self.resolved = range;
        self.generation += 1;
        debug!(
            from_ms = range.from_ms(),
            to_ms = range.to_ms(),
            generation = self.generation,
            mode = ?self.mode,
            "range changed"
        );
        Ok(RangeUpdate::Changed {
            range,
            generation: self.generation,
        })
    }

    fn fail(&mut self, err: RangeError) -> Result<RangeUpdate, RangeError> {
        self.error = Some(err.to_string());
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
