//! End-to-end projection scenarios over the public API.

use ash_projection::features::{
    acceleration, compression_factor, support_resistance, trend, velocity, volatility,
    volume_weighted_movement,
};
use ash_projection::{
    AnalysisWindow, Config, DirectionBias, Horizon, Observation, PricePredictor, ProjectionEngine,
    ProjectionPolicy, StreamId,
};

fn series(prices: &[f64], spacing_ms: i64) -> Vec<Observation> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Observation::new(p, 1_700_000_000_000 + i as i64 * spacing_ms))
        .collect()
}

fn wavy(n: usize, seed: f64) -> Vec<Observation> {
    let prices: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 + seed;
            100.0 + (x * 0.37).sin() * 3.0 + (x * 0.05).cos() * 5.0 + x * 0.01
        })
        .collect();
    series(&prices, 3000)
}

#[test]
fn test_upward_drift_short_window() {
    let short = series(&[100.0, 102.0, 104.0, 103.0, 105.0], 1000);
    let engine = ProjectionEngine::default();
    let result = engine.project(&short, &short, 25.0);

    assert!(velocity(&short) > 0.0);
    assert!(result.velocity > 0.0);
    assert!(matches!(
        result.direction_bias,
        DirectionBias::Flat | DirectionBias::Up
    ));
    assert!((0.0..=1.0).contains(&result.confidence_score));
    assert_eq!(result.compression_factor, 1.0);
    assert_eq!(result.policy, ProjectionPolicy::Standard);
}

#[test]
fn test_flat_series_projects_current_price() {
    let predictor = PricePredictor::new(Config::default()).unwrap();
    for observation in series(&[250.0; 20], 1000) {
        predictor.ingest(observation);
    }

    for horizon in Horizon::all() {
        let result = predictor.project_horizon(horizon);
        assert_eq!(result.velocity, 0.0);
        assert_eq!(result.acceleration, 0.0);
        assert_eq!(result.volatility, 0.0);
        assert_eq!(result.direction_bias, DirectionBias::Flat);
        assert_eq!(result.projected_price, 250.0);
        assert_eq!(result.confidence_score, 0.0);
    }
}

#[test]
fn test_flat_series_advanced_policy() {
    let engine = ProjectionEngine::default();
    let long = series(&[250.0; 40], 1000);
    let result = engine.project(&long[10..], &long, 60.0);

    assert_eq!(result.policy, ProjectionPolicy::Advanced);
    assert_eq!(result.projected_price, 250.0);
}

#[test]
fn test_resistance_dampening_scales_excess() {
    let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    let long = series(&prices, 3000);
    let short = long[10..].to_vec();

    // Widen the clamp so the dampened price is observable directly
    let wide = Config {
        clamp_k_long: 1000.0,
        ..Config::default()
    };
    let undamped = Config {
        level_damping: 1.0,
        ..wide.clone()
    };

    let damped = ProjectionEngine::new(wide).project(&short, &long, 60.0);
    let raw = ProjectionEngine::new(undamped).project(&short, &long, 60.0);
    assert_eq!(damped.policy, ProjectionPolicy::Advanced);
    assert_eq!(damped.analysis_window, AnalysisWindow::Long);

    let resistance = support_resistance(&long).resistance.unwrap();
    assert_eq!(resistance, 136.0);
    assert!(raw.projected_price > resistance);

    let blended = trend(&long[25..]) * 0.5 + trend(&long[10..]) * 0.3 + trend(&long) * 0.2;
    let expected_raw =
        139.0 * (1.0 + blended * 60.0 / 3600.0) + volume_weighted_movement(&long) * 1.0;
    assert!((raw.projected_price - expected_raw).abs() < 1e-9);

    let excess = damped.projected_price - resistance;
    assert!((excess - 0.3 * (raw.projected_price - resistance)).abs() < 1e-9);
}

#[test]
fn test_no_dampening_below_resistance() {
    let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    let long = series(&prices, 3000);
    // Current price sits well inside the level band
    let short = series(&[119.0, 119.5, 120.0, 119.5, 120.0], 3000);

    let wide = Config {
        clamp_k_long: 1000.0,
        ..Config::default()
    };
    let undamped = Config {
        level_damping: 1.0,
        ..wide.clone()
    };

    let damped = ProjectionEngine::new(wide).project(&short, &long, 60.0);
    let raw = ProjectionEngine::new(undamped).project(&short, &long, 60.0);

    assert!(raw.projected_price > 120.0 && raw.projected_price < 136.0);
    assert_eq!(damped.projected_price, raw.projected_price);
}

#[test]
fn test_default_clamp_binds_on_advanced_projection() {
    let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    let long = series(&prices, 3000);
    let result = ProjectionEngine::default().project(&long[10..], &long, 60.0);

    let lower = 139.0 * (-3.0 * volatility(&long)).exp();
    let upper = 139.0 * (3.0 * volatility(&long)).exp();
    assert!(result.projected_price >= lower - 1e-9);
    assert!(result.projected_price <= upper + 1e-9);
}

#[test]
fn test_reset_then_cold_start() {
    let predictor = PricePredictor::new(Config::default()).unwrap();
    predictor.switch_stream(StreamId::new("binance", "ethusdt"));
    for observation in wavy(200, 0.0) {
        predictor.ingest(observation);
    }
    assert_ne!(
        predictor.project_horizon(Horizon::Minute).policy,
        ProjectionPolicy::ColdStart
    );

    predictor.reset_stream();
    for observation in series(&[10.0, 10.5, 11.0, 10.8], 3000) {
        predictor.ingest(observation);
    }

    for horizon in Horizon::all() {
        let result = predictor.project_horizon(horizon);
        assert_eq!(result.direction_bias, DirectionBias::Flat);
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.projected_price, 10.8);
    }
}

#[test]
fn test_projection_is_deterministic() {
    let engine = ProjectionEngine::default();
    let long = wavy(300, 1.5);
    let short = long[long.len() - 30..].to_vec();

    for horizon in [5.0, 25.0, 60.0, 300.0] {
        let first = engine.project(&short, &long, horizon);
        let second = engine.project(&short, &long, horizon);
        assert_eq!(first, second);
        assert_eq!(
            first.projected_price.to_bits(),
            second.projected_price.to_bits()
        );
    }
}

#[test]
fn test_clamp_and_confidence_bounds_hold() {
    let engine = ProjectionEngine::default();

    for seed in 0..25 {
        let long = wavy(40 + seed * 13, seed as f64 * 0.7);
        let short = long[long.len().saturating_sub(30)..].to_vec();
        let current = short.last().map(|o| o.price).unwrap();

        for horizon in [1.0, 25.0, 59.9, 60.0, 120.0, 3600.0] {
            let result = engine.project(&short, &long, horizon);
            let k = if horizon >= 60.0 { 3.0 } else { 2.0 };
            let upper = current * (k * result.volatility).exp();
            let lower = current * (-k * result.volatility).exp();

            assert!(result.projected_price <= upper + 1e-9);
            assert!(result.projected_price >= lower - 1e-9);
            assert!((0.0..=1.0).contains(&result.confidence_score));
            assert!(result.volatility >= 0.0);
            assert!(result.compression_factor > 0.0);
        }
    }
}

#[test]
fn test_estimators_on_long_window() {
    let long = wavy(1200, 0.0);

    assert!(volatility(&long) > 0.0);
    assert!(compression_factor(&long) > 0.0);
    assert!(acceleration(&long).is_finite());

    let levels = support_resistance(&long);
    assert!(levels.support.unwrap() <= levels.resistance.unwrap());
}

#[test]
fn test_out_of_order_timestamps_are_tolerated() {
    let predictor = PricePredictor::new(Config::default()).unwrap();
    let mut observations = series(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 1000);
    observations.swap(2, 3);
    let duplicate = observations[5];
    observations.push(duplicate);

    for observation in observations {
        predictor.ingest(observation);
    }

    let status = predictor.status();
    assert_eq!(status.short_len, 7);
    assert_eq!(status.out_of_order, 2);

    let result = predictor.project(25.0);
    assert_eq!(result.skipped_intervals, 2);
    assert!(result.projected_price.is_finite());
    assert!((0.0..=1.0).contains(&result.confidence_score));
}
