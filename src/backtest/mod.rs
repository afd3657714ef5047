//! Walk-forward backtest orchestration.
//!
//! This module ties the pipeline together:
//! - Collaborator traits for prediction/price sources and report storage
//! - The engine that aligns, windows, scores and aggregates
//! - The last-report slot shared with readers
//! - Error taxonomy for failed runs

pub mod cache;
pub mod engine;
pub mod error;
pub mod sources;
pub mod store;

pub use cache::ReportCache;
pub use engine::{BacktestConfig, BacktestEngine, BacktestReport, RunConfiguration, WindowDataPoint};
pub use error::{BacktestError, BacktestResult};
pub use sources::{InMemorySource, PredictionSource, PriceSource, SourceError};
pub use store::{InMemoryReportStore, JsonReportStore, ReportStore, StoreError};
