//! Per-window forecast accuracy metrics.
//!
//! Scores the test slice of a walk-forward window: error magnitudes, percentage
//! error, directional hit rate, explained variance, confidence-weighted error
//! and pillar/error correlations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::AlignedPoint;
use crate::walkforward::Window;

use super::correlation::pearson;
use super::nan;

/// Names of the per-window metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Mse,
    Rmse,
    Mae,
    Mape,
    DirectionalAccuracy,
    RSquared,
    ConfidenceWeightedError,
}

impl MetricName {
    pub const ALL: [MetricName; 7] = [
        MetricName::Mse,
        MetricName::Rmse,
        MetricName::Mae,
        MetricName::Mape,
        MetricName::DirectionalAccuracy,
        MetricName::RSquared,
        MetricName::ConfidenceWeightedError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Rmse => "rmse",
            Self::Mae => "mae",
            Self::Mape => "mape",
            Self::DirectionalAccuracy => "directional_accuracy",
            Self::RSquared => "r_squared",
            Self::ConfidenceWeightedError => "confidence_weighted_error",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Accuracy metrics for one test slice.
///
/// A NaN value means the metric is undefined for the window (for example MAPE
/// when every actual price is zero); it is never replaced by 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForecastMetrics {
    #[serde(with = "nan")]
    pub mse: f64,
    #[serde(with = "nan")]
    pub rmse: f64,
    #[serde(with = "nan")]
    pub mae: f64,
    /// Mean absolute percentage error, in percent.
    #[serde(with = "nan")]
    pub mape: f64,
    /// Directional hit rate, in percent.
    #[serde(with = "nan")]
    pub directional_accuracy: f64,
    #[serde(with = "nan")]
    pub r_squared: f64,
    #[serde(with = "nan")]
    pub confidence_weighted_error: f64,
}

impl ForecastMetrics {
    pub fn get(&self, name: MetricName) -> f64 {
        match name {
            MetricName::Mse => self.mse,
            MetricName::Rmse => self.rmse,
            MetricName::Mae => self.mae,
            MetricName::Mape => self.mape,
            MetricName::DirectionalAccuracy => self.directional_accuracy,
            MetricName::RSquared => self.r_squared,
            MetricName::ConfidenceWeightedError => self.confidence_weighted_error,
        }
    }
}

/// Start, end and size of a train or test slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDescriptor {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub samples: usize,
}

/// Effective denominators of metrics that skip degenerate points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    /// Points with a non-zero actual price.
    pub mape: usize,
    /// Consecutive-pair comparisons (n - 1).
    pub directional: usize,
}

/// Raw test-period point kept for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDataPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "nan")]
    pub predicted: f64,
    #[serde(with = "nan")]
    pub actual: f64,
    pub confidence: f64,
    pub category: Option<String>,
}

impl From<&AlignedPoint> for TestDataPoint {
    fn from(point: &AlignedPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            predicted: point.predicted_price,
            actual: point.actual_price,
            confidence: point.confidence,
            category: point.category.clone(),
        }
    }
}

/// Scored output for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub window_id: usize,
    pub train_period: PeriodDescriptor,
    pub test_period: PeriodDescriptor,
    pub metrics: ForecastMetrics,
    pub sample_counts: SampleCounts,
    /// Pillar name -> Pearson r between pillar score and absolute error.
    #[serde(with = "nan::map")]
    pub pillar_correlations: BTreeMap<String, f64>,
    /// Pillar name -> number of test points that carried the score.
    pub pillar_coverage: BTreeMap<String, usize>,
    pub test_data: Vec<TestDataPoint>,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Score a window's test slice. Returns `None` if the slice is empty.
    pub fn score(window: &Window<'_>) -> Option<WindowMetrics> {
        let test = window.test_data;
        if test.is_empty() {
            return None;
        }

        let (metrics, sample_counts) = Self::forecast_metrics(test);
        let (pillar_correlations, pillar_coverage) = Self::pillar_correlations(test);

        Some(WindowMetrics {
            window_id: window.window_id,
            train_period: PeriodDescriptor {
                start: window.train_start,
                end: window.train_end,
                samples: window.train_data.len(),
            },
            test_period: PeriodDescriptor {
                start: window.test_start,
                end: window.test_end,
                samples: test.len(),
            },
            metrics,
            sample_counts,
            pillar_correlations,
            pillar_coverage,
            test_data: test.iter().map(TestDataPoint::from).collect(),
        })
    }

    /// Compute every accuracy metric over a non-empty slice.
    pub fn forecast_metrics(points: &[AlignedPoint]) -> (ForecastMetrics, SampleCounts) {
        let n = points.len() as f64;

        let mse = points.iter().map(|p| p.error().powi(2)).sum::<f64>() / n;
        let mae = points.iter().map(|p| p.abs_error()).sum::<f64>() / n;
        let (mape, mape_samples) = Self::mape(points);
        let (directional_accuracy, directional_samples) = Self::directional_accuracy(points);
        let confidence_weighted_error =
            points.iter().map(|p| p.abs_error() * p.confidence).sum::<f64>() / n;

        let metrics = ForecastMetrics {
            mse,
            rmse: mse.sqrt(),
            mae,
            mape,
            directional_accuracy,
            r_squared: Self::r_squared(points),
            confidence_weighted_error,
        };

        let counts = SampleCounts {
            mape: mape_samples,
            directional: directional_samples,
        };

        (metrics, counts)
    }

    /// MAPE in percent over points with a non-zero actual price.
    ///
    /// NaN when no such point exists.
    fn mape(points: &[AlignedPoint]) -> (f64, usize) {
        let (sum, count) = points
            .iter()
            .filter(|p| p.actual_price != 0.0)
            .fold((0.0, 0usize), |(sum, count), p| {
                (sum + p.abs_error() / p.actual_price, count + 1)
            });

        (100.0 * sum / count as f64, count)
    }

    /// Directional hit rate in percent.
    ///
    /// The predicted direction is measured from the previous actual price, not
    /// the previous prediction. Zero when there are fewer than two points.
    pub fn directional_accuracy(points: &[AlignedPoint]) -> (f64, usize) {
        if points.len() <= 1 {
            return (0.0, 0);
        }

        let comparisons = points.len() - 1;
        let hits = points
            .windows(2)
            .filter(|pair| {
                let previous = pair[0].actual_price;
                let actual = direction(pair[1].actual_price - previous);
                let predicted = direction(pair[1].predicted_price - previous);
                actual == predicted
            })
            .count();

        (100.0 * hits as f64 / comparisons as f64, comparisons)
    }

    /// Coefficient of determination; 0 for a constant actual series.
    fn r_squared(points: &[AlignedPoint]) -> f64 {
        let n = points.len() as f64;
        let mean_actual = points.iter().map(|p| p.actual_price).sum::<f64>() / n;

        let tss: f64 = points.iter().map(|p| (p.actual_price - mean_actual).powi(2)).sum();
        let rss: f64 = points.iter().map(|p| p.error().powi(2)).sum();

        if tss == 0.0 {
            return 0.0;
        }
        1.0 - rss / tss
    }

    /// Correlate each pillar seen in the slice with absolute error.
    ///
    /// A point missing the pillar contributes 0 to the series; coverage records
    /// how many points actually carried it.
    fn pillar_correlations(
        points: &[AlignedPoint],
    ) -> (BTreeMap<String, f64>, BTreeMap<String, usize>) {
        let names: BTreeSet<&str> = points
            .iter()
            .flat_map(|p| p.pillars.keys().map(String::as_str))
            .collect();

        let abs_errors: Vec<f64> = points.iter().map(AlignedPoint::abs_error).collect();

        let mut correlations = BTreeMap::new();
        let mut coverage = BTreeMap::new();

        for name in names {
            let scores: Vec<Option<f64>> = points.iter().map(|p| p.pillar(name)).collect();
            let present = scores.iter().filter(|s| s.is_some()).count();
            let series: Vec<f64> = scores.into_iter().map(|s| s.unwrap_or(0.0)).collect();

            correlations.insert(name.to_string(), pearson(&series, &abs_errors));
            coverage.insert(name.to_string(), present);
        }

        (correlations, coverage)
    }
}

fn direction(delta: f64) -> i8 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}
