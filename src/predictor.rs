//! Stream-level projection interface.
//!
//! Provides [`PricePredictor`], which owns the rolling windows of one
//! market stream and serves projections from point-in-time snapshots, and
//! the [`Config`] that parameterizes it.

use crate::buffer::{Backfill, Observation, WindowStore};
use crate::engine::{ProjectionEngine, ProjectionResult};
use crate::features::LevelConfig;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Projection horizons used by the dashboard timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    /// Short-horizon tick
    Tick = 25,
    /// Medium-horizon tick, draws on the long window
    Minute = 60,
}

impl Horizon {
    /// Get all horizons in order.
    pub fn all() -> Vec<Horizon> {
        vec![Horizon::Tick, Horizon::Minute]
    }

    /// Get the horizon value in seconds.
    pub fn as_seconds(&self) -> f64 {
        *self as u32 as f64
    }
}

/// Blend weights for the trailing-short, trailing-medium and full-window trends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendWeights {
    pub short: f64,
    pub medium: f64,
    pub long: f64,
}

impl Default for TrendWeights {
    fn default() -> Self {
        Self {
            short: 0.5,
            medium: 0.3,
            long: 0.2,
        }
    }
}

/// Configuration for windows and projection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Short-term window capacity
    pub short_capacity: usize,

    /// Long-term window capacity (~1 hour at a 3 second cadence)
    pub long_capacity: usize,

    /// Short-window length below which projections cold-start
    pub min_points: usize,

    /// Long-window length needed before long horizons analyze it
    pub long_window_min_points: usize,

    /// Long-window length needed for the blended-trend policy
    pub advanced_min_points: usize,

    /// Horizons at or above this many seconds count as long
    pub long_horizon_secs: f64,

    /// Trailing window lengths for the short and medium trends
    pub short_trend_points: usize,
    pub medium_trend_points: usize,

    pub trend_weights: TrendWeights,

    /// Fraction of a support/resistance breach kept
    pub level_damping: f64,

    /// Compression and support/resistance thresholds
    pub levels: LevelConfig,

    /// Volatility clamp multipliers
    pub clamp_k_short: f64,
    pub clamp_k_long: f64,

    /// Window lengths at which data quality saturates
    pub quality_points_short: usize,
    pub quality_points_long: usize,

    /// Rescale constant applied to the blended per-sample trend
    pub trend_normalization_secs: f64,

    /// Rescale constant applied to the volume-weighted movement
    pub volume_adjustment_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            short_capacity: 30,
            long_capacity: 1200,
            min_points: 5,
            long_window_min_points: 10,
            advanced_min_points: 30,
            long_horizon_secs: 60.0,
            short_trend_points: 15,
            medium_trend_points: 30,
            trend_weights: TrendWeights::default(),
            level_damping: 0.3,
            levels: LevelConfig::default(),
            clamp_k_short: 2.0,
            clamp_k_long: 3.0,
            quality_points_short: 30,
            quality_points_long: 60,
            trend_normalization_secs: 3600.0,
            volume_adjustment_secs: 60.0,
        }
    }
}

impl Config {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).context("invalid projection config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    ///
    /// # Arguments
    /// * `path` - Path to a JSON document; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    /// Check capacities, trend lengths, weights, clamp multipliers, rescale
    /// constants, level ranks and damping for usable values.
    pub fn validate(&self) -> Result<()> {
        if self.short_capacity == 0 || self.long_capacity == 0 {
            anyhow::bail!("window capacities must be positive");
        }
        if self.long_capacity < self.short_capacity {
            anyhow::bail!(
                "long_capacity ({}) must be at least short_capacity ({})",
                self.long_capacity,
                self.short_capacity
            );
        }
        if self.short_trend_points == 0 || self.medium_trend_points == 0 {
            anyhow::bail!("trend window lengths must be positive");
        }

        let non_negative = [
            ("trend_weights.short", self.trend_weights.short),
            ("trend_weights.medium", self.trend_weights.medium),
            ("trend_weights.long", self.trend_weights.long),
            ("clamp_k_short", self.clamp_k_short),
            ("clamp_k_long", self.clamp_k_long),
            ("long_horizon_secs", self.long_horizon_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{} must be finite and non-negative, got {}", name, value);
            }
        }

        for (name, value) in [
            ("trend_normalization_secs", self.trend_normalization_secs),
            ("volume_adjustment_secs", self.volume_adjustment_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("{} must be finite and positive, got {}", name, value);
            }
        }

        if !(0.0..=1.0).contains(&self.level_damping) {
            anyhow::bail!("level_damping must be in [0, 1], got {}", self.level_damping);
        }

        let levels = &self.levels;
        if levels.min_points == 0 {
            anyhow::bail!("levels.min_points must be positive");
        }
        for (name, value) in [
            ("levels.support_percentile", levels.support_percentile),
            ("levels.resistance_percentile", levels.resistance_percentile),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be in [0, 1], got {}", name, value);
            }
        }
        if levels.support_percentile > levels.resistance_percentile {
            anyhow::bail!(
                "levels.support_percentile ({}) exceeds levels.resistance_percentile ({})",
                levels.support_percentile,
                levels.resistance_percentile
            );
        }

        Ok(())
    }
}

/// Identity of a tracked market stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub market: String,
    pub symbol: String,
}

impl StreamId {
    /// Symbols are normalized to upper case.
    pub fn new(market: impl Into<String>, symbol: impl AsRef<str>) -> Self {
        Self {
            market: market.into(),
            symbol: symbol.as_ref().to_uppercase(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.symbol)
    }
}

/// Window fill levels for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStatus {
    pub stream: Option<StreamId>,
    pub short_len: usize,
    pub long_len: usize,

    /// Short window has left cold start
    pub is_ready: bool,

    /// Long window can back long-horizon projections
    pub has_long_history: bool,

    pub out_of_order: u64,
}

#[derive(Debug)]
struct StreamState {
    id: Option<StreamId>,
    windows: WindowStore,
}

/// Owns the windows of one market stream and serves projections.
///
/// All methods take `&self`; share it behind an `Arc` between the ingesting
/// task and any projection timers. Snapshots are copied under a read lock so
/// a concurrent push is never observed half-applied.
#[derive(Debug)]
pub struct PricePredictor {
    state: RwLock<StreamState>,
    engine: ProjectionEngine,
}

impl PricePredictor {
    /// Initialize a predictor with a validated config.
    ///
    /// # Example
    /// ```
    /// use ash_projection::{Config, Observation, PricePredictor};
    ///
    /// let predictor = PricePredictor::new(Config::default()).unwrap();
    /// for i in 0..10 {
    ///     predictor.ingest(Observation::new(100.0 + i as f64, i * 3000));
    /// }
    /// let projection = predictor.project(25.0);
    /// assert!(projection.confidence_score <= 1.0);
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let windows = WindowStore::new(config.short_capacity, config.long_capacity);

        Ok(Self {
            state: RwLock::new(StreamState { id: None, windows }),
            engine: ProjectionEngine::new(config),
        })
    }

    /// Get the active configuration.
    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    // The windows are consistent after every write, so a poisoned lock is
    // still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, StreamState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StreamState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an observation into both windows.
    ///
    /// Observations whose timestamp does not advance are accepted and logged.
    ///
    /// # Arguments
    /// * `observation` - Latest reading from the observation source
    pub fn ingest(&self, observation: Observation) {
        let mut state = self.write();
        if !state.windows.push(observation) {
            warn!(
                timestamp_ms = observation.timestamp_ms,
                out_of_order = state.windows.out_of_order_count(),
                "Observation timestamp did not advance; accepted as-is"
            );
        }
    }

    /// Seed the long window with historical readings placed before any live data.
    ///
    /// Readings that are not older than the long window's oldest observation
    /// are skipped, so the window stays time-ordered whenever this is called.
    ///
    /// # Arguments
    /// * `history` - Historical readings (e.g. one hour of 1-minute closes)
    pub fn seed_history<I>(&self, history: I) -> Backfill
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut state = self.write();
        let backfill = state.windows.backfill_long(history);
        if backfill.skipped > 0 {
            warn!(
                skipped = backfill.skipped,
                "History overlaps live data; newer readings skipped"
            );
        }
        info!(
            inserted = backfill.inserted,
            long_len = state.windows.long_len(),
            "Seeded long window with history"
        );
        backfill
    }

    /// Clear both windows.
    pub fn reset_stream(&self) {
        let mut state = self.write();
        state.windows.reset();
        info!(stream = ?state.id, "Stream reset");
    }

    /// Track `id`, clearing the windows if it differs from the current stream.
    ///
    /// Returns `true` when the windows were reset.
    pub fn switch_stream(&self, id: StreamId) -> bool {
        let mut state = self.write();
        if state.id.as_ref() == Some(&id) {
            return false;
        }

        info!(stream = %id, "Switching stream");
        state.windows.reset();
        state.id = Some(id);
        true
    }

    /// Get the currently tracked stream, if any.
    pub fn stream(&self) -> Option<StreamId> {
        self.read().id.clone()
    }

    /// Point-in-time copies of the short and long windows.
    pub fn snapshot(&self) -> (Vec<Observation>, Vec<Observation>) {
        let state = self.read();
        (state.windows.snapshot_short(), state.windows.snapshot_long())
    }

    /// Project the price `horizon_seconds` ahead from a fresh snapshot.
    pub fn project(&self, horizon_seconds: f64) -> ProjectionResult {
        let (short, long) = self.snapshot();
        self.engine.project(&short, &long, horizon_seconds)
    }

    /// Project the price at one of the preset horizons.
    pub fn project_horizon(&self, horizon: Horizon) -> ProjectionResult {
        self.project(horizon.as_seconds())
    }

    /// Window fill levels and readiness flags for the presentation layer.
    pub fn status(&self) -> WindowStatus {
        let state = self.read();
        let config = self.engine.config();
        let short_len = state.windows.short_len();
        let long_len = state.windows.long_len();

        WindowStatus {
            stream: state.id.clone(),
            short_len,
            long_len,
            is_ready: short_len >= config.min_points,
            has_long_history: long_len >= config.long_window_min_points,
            out_of_order: state.windows.out_of_order_count(),
        }
    }
}
