//! Horizon-specific price projection.
//!
//! Combines the window estimators into a single forecast. Two policies exist:
//! constant-acceleration kinematic extrapolation for short horizons, and a
//! blended multi-timescale trend with support/resistance dampening when a
//! long horizon has enough long-window history.

use crate::buffer::Observation;
use crate::features::{
    acceleration, compression_factor_with, support_resistance_with, trend, velocity_samples,
    volatility, volume_weighted_movement, volume_weighted_velocity,
};
use crate::predictor::Config;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sign of the projected rate of change.
///
/// Serializes as `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum DirectionBias {
    Down = -1,
    Flat = 0,
    Up = 1,
}

impl DirectionBias {
    /// Sign of `value`; zero and NaN map to `Flat`.
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            DirectionBias::Up
        } else if value < 0.0 {
            DirectionBias::Down
        } else {
            DirectionBias::Flat
        }
    }

    /// Numeric sign: `-1`, `0` or `1`.
    pub fn as_i8(&self) -> i8 {
        *self as i8
    }
}

impl From<DirectionBias> for i8 {
    fn from(bias: DirectionBias) -> Self {
        bias.as_i8()
    }
}

impl TryFrom<i8> for DirectionBias {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(DirectionBias::Down),
            0 => Ok(DirectionBias::Flat),
            1 => Ok(DirectionBias::Up),
            other => Err(format!("direction bias must be -1, 0 or 1, got {}", other)),
        }
    }
}

/// Which point-projection policy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionPolicy {
    /// Not enough short-window data; last price echoed back
    ColdStart,
    /// Constant-acceleration extrapolation
    Standard,
    /// Blended trend with level dampening
    Advanced,
}

/// Which window the estimators ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisWindow {
    Short,
    Long,
}

/// A single horizon forecast. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub projected_price: f64,
    pub direction_bias: DirectionBias,

    /// Heuristic confidence in `[0, 1]`
    pub confidence_score: f64,

    /// Recent / full-window volatility ratio (1 = neutral)
    pub compression_factor: f64,

    pub velocity: f64,
    pub acceleration: f64,
    pub volatility: f64,

    /// Pairs in the analysis window skipped for non-positive elapsed time
    pub skipped_intervals: usize,

    pub policy: ProjectionPolicy,
    pub analysis_window: AnalysisWindow,
}

impl ProjectionResult {
    /// Cold-start result: last known price, no signal.
    pub fn cold_start(short_window: &[Observation]) -> Self {
        Self {
            projected_price: short_window.last().map_or(0.0, |o| o.price),
            direction_bias: DirectionBias::Flat,
            confidence_score: 0.0,
            compression_factor: 1.0,
            velocity: 0.0,
            acceleration: 0.0,
            volatility: 0.0,
            skipped_intervals: 0,
            policy: ProjectionPolicy::ColdStart,
            analysis_window: AnalysisWindow::Short,
        }
    }
}

/// Stateless projection engine holding its configuration.
#[derive(Debug, Clone, Default)]
pub struct ProjectionEngine {
    config: Config,
}

impl ProjectionEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Project the price `horizon_seconds` ahead.
    ///
    /// Never fails: insufficient data degrades to [`ProjectionResult::cold_start`].
    /// A non-finite horizon is treated as zero.
    pub fn project(
        &self,
        short_window: &[Observation],
        long_window: &[Observation],
        horizon_seconds: f64,
    ) -> ProjectionResult {
        let cfg = &self.config;
        let horizon = if horizon_seconds.is_finite() {
            horizon_seconds
        } else {
            0.0
        };

        if short_window.len() < cfg.min_points {
            return ProjectionResult::cold_start(short_window);
        }
        let current_price = match short_window.last() {
            Some(o) => o.price,
            None => return ProjectionResult::cold_start(short_window),
        };

        let long_horizon = horizon >= cfg.long_horizon_secs;
        let (window, analysis_window) =
            if long_horizon && long_window.len() >= cfg.long_window_min_points {
                (long_window, AnalysisWindow::Long)
            } else {
                (short_window, AnalysisWindow::Short)
            };

        let velocity = volume_weighted_velocity(window);
        let acceleration = acceleration(window);
        let volatility = volatility(window);
        let compression_factor = compression_factor_with(window, cfg.levels.min_points);
        let skipped_intervals = velocity_samples(window).skipped_intervals;
        if skipped_intervals > 0 {
            debug!(
                skipped_intervals,
                window_len = window.len(),
                "Skipped non-positive time deltas in analysis window"
            );
        }

        let advanced = long_horizon && long_window.len() >= cfg.advanced_min_points;
        let (raw_price, policy) = if advanced {
            (
                self.advanced_projection(window, current_price, horizon),
                ProjectionPolicy::Advanced,
            )
        } else {
            (
                current_price + velocity * horizon + 0.5 * acceleration * horizon * horizon,
                ProjectionPolicy::Standard,
            )
        };

        let k = if long_horizon {
            cfg.clamp_k_long
        } else {
            cfg.clamp_k_short
        };
        let max_price = current_price * (k * volatility).exp();
        let min_price = current_price * (-k * volatility).exp();
        let projected_price = max_price.min(min_price.max(raw_price));

        let direction_bias = DirectionBias::from_value(velocity + acceleration * horizon);

        let quality_points = if long_horizon {
            cfg.quality_points_long
        } else {
            cfg.quality_points_short
        };
        let confidence_score = confidence(
            velocity,
            acceleration,
            volatility,
            window.len(),
            quality_points,
        );

        debug!(
            horizon,
            ?analysis_window,
            ?policy,
            window_len = window.len(),
            raw_price,
            projected_price,
            "Projection computed"
        );

        ProjectionResult {
            projected_price,
            direction_bias,
            confidence_score,
            compression_factor,
            velocity,
            acceleration,
            volatility,
            skipped_intervals,
            policy,
            analysis_window,
        }
    }

    /// Blended multi-timescale trend plus volume-weighted drift, dampened at
    /// support/resistance.
    ///
    /// The trend is a per-sample rate but is rescaled as if per second over
    /// `trend_normalization_secs`. This is a known approximation kept for
    /// output compatibility.
    fn advanced_projection(&self, window: &[Observation], current_price: f64, horizon: f64) -> f64 {
        let cfg = &self.config;
        let trailing = |n: usize| &window[window.len().saturating_sub(n)..];

        let short_trend = trend(trailing(cfg.short_trend_points));
        let medium_trend = trend(trailing(cfg.medium_trend_points));
        let long_trend = trend(window);
        let blended = short_trend * cfg.trend_weights.short
            + medium_trend * cfg.trend_weights.medium
            + long_trend * cfg.trend_weights.long;

        let trend_projection =
            current_price * (1.0 + blended * horizon / cfg.trend_normalization_secs);
        let volume_adjustment =
            volume_weighted_movement(window) * (horizon / cfg.volume_adjustment_secs);
        let projection = trend_projection + volume_adjustment;

        let levels = support_resistance_with(window, &cfg.levels);
        match (levels.support, levels.resistance) {
            (_, Some(resistance)) if projection > current_price && projection > resistance => {
                resistance + (projection - resistance) * cfg.level_damping
            }
            (Some(support), _) if projection < current_price && projection < support => {
                support - (support - projection) * cfg.level_damping
            }
            _ => projection,
        }
    }
}

/// Signal strength x acceleration sigmoid x data sufficiency, clamped to `[0, 1]`.
fn confidence(
    velocity: f64,
    acceleration: f64,
    volatility: f64,
    window_len: usize,
    quality_points: usize,
) -> f64 {
    let velocity_magnitude = velocity.abs();
    let denominator = velocity_magnitude + volatility;
    let strength = if denominator > 0.0 {
        velocity_magnitude / denominator
    } else {
        0.0
    };

    let smoothness = 1.0 / (1.0 + (-acceleration.abs()).exp());
    let data_quality = if quality_points == 0 {
        1.0
    } else {
        (window_len as f64 / quality_points as f64).min(1.0)
    };

    let score = strength * smoothness * data_quality;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
