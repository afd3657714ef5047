//! Forecast accuracy metrics.
//!
//! - Per-window error, percentage and directional metrics
//! - Pillar/error correlation
//! - Cross-window aggregation

pub mod aggregator;
pub mod calculator;
pub mod correlation;
pub mod nan;

pub use aggregator::{AggregateReport, Aggregator, CorrelationStrength, MetricStats, PillarAnalysis};
pub use calculator::{
    ForecastMetrics, MetricName, MetricsCalculator, PeriodDescriptor, SampleCounts, TestDataPoint,
    WindowMetrics,
};
pub use correlation::pearson;
