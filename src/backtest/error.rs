//! Error taxonomy for backtest runs.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::sources::SourceError;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("No prediction data between {start} and {end}")]
    NoPredictionData {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(
        "No predictions could be aligned with prices ({predictions} predictions, {prices} prices, tolerance {tolerance_minutes}m)"
    )]
    NoAlignedPairs {
        predictions: usize,
        prices: usize,
        tolerance_minutes: i64,
    },

    #[error(
        "Insufficient data for walk-forward windows: {aligned} aligned points, {required} required (train {train_size}, test {test_size})"
    )]
    InsufficientWindows {
        aligned: usize,
        required: usize,
        train_size: usize,
        test_size: usize,
    },

    #[error("Window {0} not found")]
    WindowNotFound(usize),

    #[error("No backtest has completed yet")]
    NoReport,

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidConfig(String),
}

pub type BacktestResult<T> = Result<T, BacktestError>;
