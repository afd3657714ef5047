//! Walk-forward backtest orchestrator.
//!
//! Runs the evaluation pipeline:
//! 1. Fetch predictions and prices concurrently
//! 2. Check input integrity (advisory)
//! 3. Align predictions with the nearest price
//! 4. Slice the aligned series into rolling windows
//! 5. Score every window (parallel, order-stable)
//! 6. Aggregate across windows
//! 7. Persist the report (best-effort) and publish it as the latest

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alignment::{TimeSeriesAligner, DEFAULT_TOLERANCE_MINUTES};
use crate::data::{PredictionRecord, PriceRecord};
use crate::metrics::{
    AggregateReport, Aggregator, MetricName, MetricsCalculator, TestDataPoint, WindowMetrics,
};
use crate::validation::{InputIntegrityValidator, IntegrityReport};
use crate::walkforward::{
    Window, WindowGenerator, WindowSizing, DEFAULT_POINTS_PER_DAY, MIN_TEST_SIZE, MIN_TRAIN_SIZE,
};

use super::cache::ReportCache;
use super::error::{BacktestError, BacktestResult};
use super::sources::{PredictionSource, PriceSource};
use super::store::ReportStore;

/// Configuration for backtest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Maximum prediction/price distance accepted by the aligner (inclusive).
    pub alignment_tolerance_minutes: i64,

    /// Training span per window, in calendar days.
    pub train_window_days: u32,

    /// Test span per window, in calendar days.
    pub test_window_days: u32,

    /// Points per calendar day used to turn spans into point counts.
    pub points_per_day: usize,

    /// Smallest train slice accepted.
    pub min_train_size: usize,

    /// Smallest test slice accepted.
    pub min_test_size: usize,

    /// Score windows on the rayon pool.
    pub parallel_scoring: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            alignment_tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
            train_window_days: 30,
            test_window_days: 7,
            points_per_day: DEFAULT_POINTS_PER_DAY,
            min_train_size: MIN_TRAIN_SIZE,
            min_test_size: MIN_TEST_SIZE,
            parallel_scoring: true,
        }
    }
}

impl BacktestConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> BacktestResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> BacktestResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| BacktestError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> BacktestResult<()> {
        self.tolerance().map(|_| ())
    }

    /// Alignment tolerance as a duration. Must be non-negative and fit a `Duration`.
    pub fn tolerance(&self) -> BacktestResult<Duration> {
        let minutes = self.alignment_tolerance_minutes;
        if minutes < 0 {
            return Err(BacktestError::InvalidConfig(format!(
                "alignment_tolerance_minutes must be non-negative, got {}",
                minutes
            )));
        }
        Duration::try_minutes(minutes).ok_or_else(|| {
            BacktestError::InvalidConfig(format!(
                "alignment_tolerance_minutes {} is out of range",
                minutes
            ))
        })
    }

    /// Point counts for the configured day spans.
    pub fn window_sizing(&self) -> WindowSizing {
        WindowSizing::from_days(self.train_window_days, self.test_window_days, self.points_per_day)
    }

    fn window_generator(&self, sizing: WindowSizing) -> WindowGenerator {
        WindowGenerator::new(sizing).with_minimums(self.min_train_size, self.min_test_size)
    }
}

/// Parameters a report was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub train_window_days: f64,
    pub test_window_days: f64,
    pub train_size: usize,
    pub test_size: usize,
    pub points_per_day: usize,
    pub alignment_tolerance_minutes: i64,
}

impl RunConfiguration {
    fn new(config: &BacktestConfig, sizing: WindowSizing) -> Self {
        let days = |points: usize| points as f64 / config.points_per_day.max(1) as f64;
        Self {
            train_window_days: days(sizing.train_size),
            test_window_days: days(sizing.test_size),
            train_size: sizing.train_size,
            test_size: sizing.test_size,
            points_per_day: config.points_per_day,
            alignment_tolerance_minutes: config.alignment_tolerance_minutes,
        }
    }
}

/// A test-period point tagged with the window that scored it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDataPoint {
    pub window_id: usize,
    #[serde(flatten)]
    pub point: TestDataPoint,
}

/// Result of a completed backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,

    /// Configuration used.
    pub configuration: RunConfiguration,

    pub window_count: usize,

    /// Points that survived alignment.
    pub total_aligned_points: usize,

    /// Cross-window summary.
    pub aggregate: AggregateReport,

    /// Per-window results in `window_id` order.
    pub windows: Vec<WindowMetrics>,

    /// Input checks run before alignment.
    #[serde(default)]
    pub integrity: IntegrityReport,

    pub generated_at: DateTime<Utc>,
}

impl BacktestReport {
    pub fn window(&self, window_id: usize) -> BacktestResult<&WindowMetrics> {
        self.windows
            .iter()
            .find(|w| w.window_id == window_id)
            .ok_or(BacktestError::WindowNotFound(window_id))
    }

    /// Every test-period point across windows, in window order.
    pub fn data_points(&self) -> Vec<WindowDataPoint> {
        self.windows
            .iter()
            .flat_map(|w| {
                w.test_data.iter().map(|point| WindowDataPoint {
                    window_id: w.window_id,
                    point: point.clone(),
                })
            })
            .collect()
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        let metric = |name| {
            self.aggregate
                .metric(name)
                .map_or_else(|| "n/a".to_string(), |s| format!("{:.4}", s.mean))
        };

        let mut out = format!(
            "Backtest Results ({} to {})\n\
             ----------------------------------------\n\
             Train/Test: {} / {} points ({:.1} / {:.1} days)\n\
             Alignment Tolerance: {}m\n\
             Aligned Points: {}\n\
             Windows: {}\n\
             \n\
             Directional Accuracy: {:.1}%\n\
             Mean RMSE: {}\n\
             Mean MAPE: {}\n\
             Mean R²: {}\n\
             \n\
             Input Checks: {}",
            self.start_date,
            self.end_date,
            self.configuration.train_size,
            self.configuration.test_size,
            self.configuration.train_window_days,
            self.configuration.test_window_days,
            self.configuration.alignment_tolerance_minutes,
            self.total_aligned_points,
            self.window_count,
            self.aggregate.overall_directional_accuracy,
            metric(MetricName::Rmse),
            metric(MetricName::Mape),
            metric(MetricName::RSquared),
            self.integrity.summary(),
        );

        for check in self.integrity.failed_checks() {
            out.push_str(&format!("\n  FAILED {}: {}", check.name, check.message));
        }

        out
    }
}

/// The walk-forward backtest engine.
pub struct BacktestEngine {
    config: BacktestConfig,
    predictions: Arc<dyn PredictionSource>,
    prices: Arc<dyn PriceSource>,
    store: Arc<dyn ReportStore>,
    cache: Arc<ReportCache>,
}

impl BacktestEngine {
    /// Create a new engine with its own last-report slot.
    pub fn new(
        config: BacktestConfig,
        predictions: Arc<dyn PredictionSource>,
        prices: Arc<dyn PriceSource>,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            config,
            predictions,
            prices,
            store,
            cache: Arc::new(ReportCache::new()),
        }
    }

    /// Share a last-report slot with other readers.
    pub fn with_report_cache(mut self, cache: Arc<ReportCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run a backtest with the configured window spans.
    pub async fn run_backtest(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BacktestResult<Arc<BacktestReport>> {
        self.run(start, end, self.config.window_sizing()).await
    }

    /// Run a backtest with explicit train/test spans.
    pub async fn run_backtest_with_windows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        train_window: Duration,
        test_window: Duration,
    ) -> BacktestResult<Arc<BacktestReport>> {
        let sizing =
            WindowSizing::from_durations(train_window, test_window, self.config.points_per_day);
        self.run(start, end, sizing).await
    }

    async fn run(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sizing: WindowSizing,
    ) -> BacktestResult<Arc<BacktestReport>> {
        info!("Running walk-forward backtest from {} to {}", start, end);

        let (predictions, prices) = tokio::try_join!(
            self.predictions.fetch_predictions(start, end),
            self.prices.fetch_prices(start, end),
        )?;
        info!("Fetched {} predictions and {} prices", predictions.len(), prices.len());

        let report = Arc::new(self.evaluate(start, end, &predictions, &prices, sizing)?);

        if let Err(e) = self.store.save(&report).await {
            warn!("Failed to persist backtest report: {}", e);
        }

        self.cache.replace(Arc::clone(&report));
        Ok(report)
    }

    /// Evaluate already-fetched inputs. Nothing is persisted or cached.
    pub fn evaluate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        predictions: &[PredictionRecord],
        prices: &[PriceRecord],
        sizing: WindowSizing,
    ) -> BacktestResult<BacktestReport> {
        if predictions.is_empty() {
            return Err(BacktestError::NoPredictionData { start, end });
        }

        let integrity = InputIntegrityValidator::validate(predictions, prices);
        for check in integrity.failed_checks() {
            warn!(
                "Input check {} failed: {}{}",
                check.name,
                check.message,
                check.details.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
            );
        }

        let aligner = TimeSeriesAligner::new(self.config.tolerance()?);
        let aligned = aligner.align(predictions, prices);
        if aligned.is_empty() {
            return Err(BacktestError::NoAlignedPairs {
                predictions: predictions.len(),
                prices: prices.len(),
                tolerance_minutes: self.config.alignment_tolerance_minutes,
            });
        }
        info!(
            "Aligned {} of {} predictions (dropped {})",
            aligned.len(),
            predictions.len(),
            predictions.len() - aligned.len()
        );

        let windows = self.config.window_generator(sizing).generate(&aligned);
        if windows.is_empty() {
            return Err(BacktestError::InsufficientWindows {
                aligned: aligned.len(),
                required: sizing.required_points(),
                train_size: sizing.train_size,
                test_size: sizing.test_size,
            });
        }
        info!(
            "Generated {} walk-forward windows (train {}, test {})",
            windows.len(),
            sizing.train_size,
            sizing.test_size
        );

        let scored = self.score_windows(&windows);
        let aggregate = Aggregator::aggregate(&scored);
        let windows: Vec<WindowMetrics> = scored.into_iter().flatten().collect();

        info!(
            "Backtest complete: {} windows, directional accuracy {:.1}%",
            windows.len(),
            aggregate.overall_directional_accuracy
        );

        Ok(BacktestReport {
            start_date: start,
            end_date: end,
            configuration: RunConfiguration::new(&self.config, sizing),
            window_count: windows.len(),
            total_aligned_points: aligned.len(),
            aggregate,
            windows,
            integrity,
            generated_at: Utc::now(),
        })
    }

    /// Score windows, keeping generation order.
    fn score_windows(&self, windows: &[Window<'_>]) -> Vec<Option<WindowMetrics>> {
        let score = |window: &Window<'_>| {
            let result = MetricsCalculator::score(window);
            debug!("Scored window {}", window.window_id);
            result
        };

        if self.config.parallel_scoring {
            windows.par_iter().map(score).collect()
        } else {
            windows.iter().map(score).collect()
        }
    }

    /// Most recent completed report, if any.
    pub fn last_report(&self) -> Option<Arc<BacktestReport>> {
        self.cache.latest()
    }

    fn require_report(&self) -> BacktestResult<Arc<BacktestReport>> {
        self.last_report().ok_or(BacktestError::NoReport)
    }

    /// Aggregate report of the most recent run.
    pub fn summary(&self) -> BacktestResult<AggregateReport> {
        Ok(self.require_report()?.aggregate.clone())
    }

    /// Metrics for one window of the most recent run.
    pub fn window_details(&self, window_id: usize) -> BacktestResult<WindowMetrics> {
        Ok(self.require_report()?.window(window_id)?.clone())
    }

    /// Test-period points of the most recent run, tagged with their window.
    pub fn all_data_points(&self) -> BacktestResult<Vec<WindowDataPoint>> {
        Ok(self.require_report()?.data_points())
    }
}
