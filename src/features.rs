//! Window estimators feeding the projection engine.
//!
//! Every function here is pure: it reads an observation slice (oldest to
//! newest) and returns a documented default when the slice is too short,
//! never an error.
//!
//! Pairs whose elapsed time is zero or negative are skipped rather than
//! rejected, so a glitching upstream clock degrades the estimate instead of
//! poisoning it with infinities.

use crate::buffer::Observation;
use serde::{Deserialize, Serialize};

/// Configuration for compression and support/resistance estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Minimum window length for compression and support/resistance
    pub min_points: usize,

    /// Percentile rank used for the support level
    pub support_percentile: f64,

    /// Percentile rank used for the resistance level
    pub resistance_percentile: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            min_points: 10,
            support_percentile: 0.1,
            resistance_percentile: 0.9,
        }
    }
}

/// Per-pair velocity samples of a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VelocitySamples {
    /// `(timestamp_ms of the later endpoint, dp/dt)` per valid pair
    pub samples: Vec<(i64, f64)>,

    /// Pairs dropped because `dt <= 0`
    pub skipped_intervals: usize,
}

impl VelocitySamples {
    /// Arithmetic mean of the samples, `0` when there are none.
    pub fn mean(&self) -> f64 {
        mean(self.samples.iter().map(|&(_, v)| v))
    }
}

/// Support and resistance levels of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn elapsed_seconds(earlier_ms: i64, later_ms: i64) -> f64 {
    later_ms.saturating_sub(earlier_ms) as f64 / 1000.0
}

/// Compute velocity samples for each consecutive pair.
///
/// Each sample is `dp / dt` in price units per second, tagged with the later
/// observation's timestamp.
pub fn velocity_samples(window: &[Observation]) -> VelocitySamples {
    let mut result = VelocitySamples::default();

    for pair in window.windows(2) {
        let dt = elapsed_seconds(pair[0].timestamp_ms, pair[1].timestamp_ms);
        if dt <= 0.0 {
            result.skipped_intervals += 1;
            continue;
        }
        let dp = pair[1].price - pair[0].price;
        result.samples.push((pair[1].timestamp_ms, dp / dt));
    }

    result
}

/// Mean velocity over the window, `0` with fewer than 2 points.
pub fn velocity(window: &[Observation]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    velocity_samples(window).mean()
}

/// Mean second finite difference over the window, `0` with fewer than 3 points.
///
/// Reacts fast but amplifies noise on short windows.
pub fn acceleration(window: &[Observation]) -> f64 {
    if window.len() < 3 {
        return 0.0;
    }

    let velocities = velocity_samples(window).samples;
    let accelerations = velocities.windows(2).filter_map(|pair| {
        let (t0, v0) = pair[0];
        let (t1, v1) = pair[1];
        let dt = elapsed_seconds(t0, t1);
        (dt > 0.0).then(|| (v1 - v0) / dt)
    });

    mean(accelerations)
}

/// Velocity weighted by the later observation's volume.
///
/// Degrades to [`velocity`] when no observation carries a volume. Pairs with
/// non-positive `dt` or non-positive volume are skipped.
pub fn volume_weighted_velocity(window: &[Observation]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    if window.iter().all(|o| o.volume.is_none()) {
        return velocity(window);
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for pair in window.windows(2) {
        let dt = elapsed_seconds(pair[0].timestamp_ms, pair[1].timestamp_ms);
        let volume = match pair[1].volume {
            Some(v) if v > 0.0 => v,
            _ => continue,
        };
        if dt <= 0.0 {
            continue;
        }
        weighted_sum += (pair[1].price - pair[0].price) / dt * volume;
        total_weight += volume;
    }

    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

/// Compute one-step log returns.
///
/// Pairs where either price is non-positive are skipped. Empty with fewer
/// than 2 points.
pub fn log_returns(window: &[Observation]) -> Vec<f64> {
    if window.len() < 2 {
        return Vec::new();
    }

    window
        .windows(2)
        .filter(|pair| pair[0].price > 0.0 && pair[1].price > 0.0)
        .map(|pair| (pair[1].price / pair[0].price).ln())
        .collect()
}

/// Sample standard deviation (Bessel-corrected) of log returns.
///
/// Returns `0` when fewer than 2 returns are available.
pub fn volatility(window: &[Observation]) -> f64 {
    let returns = log_returns(window);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

    variance.sqrt()
}

/// Ratio of second-half volatility to full-window volatility.
///
/// Values below 1 flag tightening, above 1 expansion. Neutral `1` with fewer
/// than 10 points or a flat window.
pub fn compression_factor(window: &[Observation]) -> f64 {
    compression_factor_with(window, LevelConfig::default().min_points)
}

/// [`compression_factor`] with an explicit minimum window length.
///
/// # Arguments
/// * `window` - Observations, ordered from oldest to newest
/// * `min_points` - Length below which the neutral `1` is returned
pub fn compression_factor_with(window: &[Observation], min_points: usize) -> f64 {
    if window.is_empty() || window.len() < min_points {
        return 1.0;
    }

    let midpoint = window.len() / 2;
    let short_vol = volatility(&window[midpoint..]);
    let long_vol = volatility(window);

    if long_vol > 0.0 {
        short_vol / long_vol
    } else {
        1.0
    }
}

/// Least-squares slope of price against sample index, divided by mean price.
///
/// Uses unit-spaced indices, not elapsed time. `0` with fewer than 3 points.
pub fn trend(window: &[Observation]) -> f64 {
    if window.len() < 3 {
        return 0.0;
    }

    let n = window.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, observation) in window.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += observation.price;
        sum_xy += x * observation.price;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    let avg_price = sum_y / n;
    if denominator == 0.0 || avg_price == 0.0 {
        return 0.0;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    slope / avg_price
}

/// Order-statistic support (10th percentile) and resistance (90th percentile).
///
/// Not interpolated. Both absent with fewer than 10 points.
pub fn support_resistance(window: &[Observation]) -> SupportResistance {
    support_resistance_with(window, &LevelConfig::default())
}

/// [`support_resistance`] with explicit minimum length and percentile ranks.
///
/// # Arguments
/// * `window` - Observations, ordered from oldest to newest
/// * `config` - Minimum length and the support/resistance ranks
pub fn support_resistance_with(window: &[Observation], config: &LevelConfig) -> SupportResistance {
    if window.is_empty() || window.len() < config.min_points {
        return SupportResistance::default();
    }

    let mut prices: Vec<f64> = window.iter().map(|o| o.price).collect();
    prices.sort_by(f64::total_cmp);

    let n = prices.len();
    let pick = |rank: f64| {
        let index = ((n as f64 * rank).floor() as usize).min(n - 1);
        prices[index]
    };

    SupportResistance {
        support: Some(pick(config.support_percentile)),
        resistance: Some(pick(config.resistance_percentile)),
    }
}

/// Volume-weighted average price change per step.
///
/// Absent, zero or NaN volumes count with weight 1. `0` with fewer than 2
/// points.
pub fn volume_weighted_movement(window: &[Observation]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }

    let mut weighted_change = 0.0;
    let mut total_volume = 0.0;
    for pair in window.windows(2) {
        let volume = match pair[1].volume {
            Some(v) if v != 0.0 && !v.is_nan() => v,
            _ => 1.0,
        };
        weighted_change += (pair[1].price - pair[0].price) * volume;
        total_volume += volume;
    }

    if total_volume > 0.0 {
        weighted_change / total_volume
    } else {
        0.0
    }
}
