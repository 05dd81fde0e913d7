//! Streaming price projection over rolling observation windows.
//!
//! This crate keeps a short-term and a long-term window of price
//! observations per market stream and turns them into short- and
//! medium-horizon projections with a direction signal and a confidence
//! score. It is a best-effort heuristic extrapolator, not a statistical
//! forecasting model.

pub mod buffer;
pub mod engine;
pub mod features;
pub mod predictor;

pub use buffer::{Backfill, Observation, RollingBuffer, WindowStore};
pub use engine::{
    AnalysisWindow, DirectionBias, ProjectionEngine, ProjectionPolicy, ProjectionResult,
};
pub use features::{LevelConfig, SupportResistance};
pub use predictor::{Config, Horizon, PricePredictor, StreamId, TrendWeights, WindowStatus};

/// Library-wide error type.
pub type Result<T> = anyhow::Result<T>;
