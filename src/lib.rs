pub mod alignment;
pub mod backtest;
pub mod data;
pub mod metrics;
pub mod validation;
pub mod walkforward;

// Re-export commonly used types
pub use alignment::TimeSeriesAligner;
pub use backtest::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestReport, BacktestResult,
    JsonReportStore, PredictionSource, PriceSource, ReportCache, ReportStore,
};
pub use data::{AlignedPoint, JsonFileSource, PredictionRecord, PriceRecord};
pub use metrics::{AggregateReport, Aggregator, MetricsCalculator, WindowMetrics};
pub use validation::InputIntegrityValidator;
pub use walkforward::{make_windows, Window, WindowGenerator, WindowSizing};
