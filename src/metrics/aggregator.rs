//! Cross-window aggregation.
//!
//! Reduces per-window metrics into summary statistics for the whole run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

use super::calculator::{MetricName, WindowMetrics};

/// Distribution of one metric across windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std: f64,
    /// Windows that contributed a defined value.
    pub windows: usize,
}

/// Qualitative reading of a correlation's magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
    None,
}

impl CorrelationStrength {
    /// Label by absolute value; the sign does not matter.
    pub fn from_correlation(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude > 0.7 {
            Self::Strong
        } else if magnitude > 0.4 {
            Self::Moderate
        } else if magnitude > 0.2 {
            Self::Weak
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Mean pillar/error correlation across windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarAnalysis {
    pub mean_correlation: f64,
    pub strength: CorrelationStrength,
    pub windows: usize,
}

/// Summary of a complete walk-forward run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub window_count: usize,
    /// Test points scored across all windows.
    pub total_data_points: usize,
    /// Directional accuracy weighted by each window's test size.
    pub overall_directional_accuracy: f64,
    pub metrics: BTreeMap<MetricName, MetricStats>,
    pub pillar_analysis: BTreeMap<String, PillarAnalysis>,
}

impl AggregateReport {
    pub fn is_empty(&self) -> bool {
        self.window_count == 0
    }

    pub fn metric(&self, name: MetricName) -> Option<&MetricStats> {
        self.metrics.get(&name)
    }

    /// Generate a summary report.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Walk-Forward Accuracy Summary\n\
             =============================\n\
             \n\
             Windows: {}\n\
             Test Points: {}\n\
             Overall Directional Accuracy: {:.1}%\n\
             \n\
             {:<26} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            self.window_count,
            self.total_data_points,
            self.overall_directional_accuracy,
            "Metric",
            "Mean",
            "Median",
            "Min",
            "Max",
            "Std",
        );

        for name in MetricName::ALL {
            match self.metrics.get(&name) {
                Some(s) => out.push_str(&format!(
                    "{:<26} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}\n",
                    name, s.mean, s.median, s.min, s.max, s.std
                )),
                None => out.push_str(&format!("{:<26} {:>10}\n", name, "n/a")),
            }
        }

        if !self.pillar_analysis.is_empty() {
            out.push_str("\nPillar Correlation With Absolute Error\n");
            for (pillar, analysis) in &self.pillar_analysis {
                out.push_str(&format!(
                    "  {:<20} {:>+7.3} ({})\n",
                    pillar, analysis.mean_correlation, analysis.strength
                ));
            }
        }

        out
    }
}

/// Cross-window aggregator.
pub struct Aggregator;

impl Aggregator {
    /// Aggregate scored windows. `None` entries are ignored; with no usable
    /// window the report is empty.
    pub fn aggregate(results: &[Option<WindowMetrics>]) -> AggregateReport {
        let windows: Vec<&WindowMetrics> = results.iter().flatten().collect();
        Self::aggregate_windows(&windows)
    }

    pub fn aggregate_windows(windows: &[&WindowMetrics]) -> AggregateReport {
        if windows.is_empty() {
            return AggregateReport::default();
        }

        let total_data_points: usize = windows.iter().map(|w| w.test_period.samples).sum();

        let metrics = MetricName::ALL
            .into_iter()
            .filter_map(|name| {
                let values: Vec<f64> = windows.iter().map(|w| w.metrics.get(name)).collect();
                Self::stats(&values).map(|stats| (name, stats))
            })
            .collect();

        AggregateReport {
            window_count: windows.len(),
            total_data_points,
            overall_directional_accuracy: Self::weighted_directional_accuracy(windows),
            metrics,
            pillar_analysis: Self::pillar_analysis(windows),
        }
    }

    /// Summary statistics over the defined (non-NaN) values.
    pub fn stats(values: &[f64]) -> Option<MetricStats> {
        let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return None;
        }

        Some(MetricStats {
            mean: Statistics::mean(&valid),
            median: Data::new(valid.clone()).median(),
            min: Statistics::min(&valid),
            max: Statistics::max(&valid),
            std: Statistics::population_std_dev(&valid),
            windows: valid.len(),
        })
    }

    /// Directional accuracy weighted by test sample count, so thin windows do
    /// not count as much as full ones.
    fn weighted_directional_accuracy(windows: &[&WindowMetrics]) -> f64 {
        let (weighted, weight) = windows.iter().fold((0.0, 0usize), |(sum, n), w| {
            let samples = w.test_period.samples;
            (sum + w.metrics.directional_accuracy * samples as f64, n + samples)
        });

        if weight == 0 {
            return 0.0;
        }
        weighted / weight as f64
    }

    fn pillar_analysis(windows: &[&WindowMetrics]) -> BTreeMap<String, PillarAnalysis> {
        let mut per_pillar: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for window in windows {
            for (pillar, r) in &window.pillar_correlations {
                if !r.is_nan() {
                    per_pillar.entry(pillar.as_str()).or_default().push(*r);
                }
            }
        }

        per_pillar
            .into_iter()
            .map(|(pillar, values)| {
                let mean_correlation = values.iter().sum::<f64>() / values.len() as f64;
                let analysis = PillarAnalysis {
                    mean_correlation,
                    strength: CorrelationStrength::from_correlation(mean_correlation),
                    windows: values.len(),
                };
                (pillar.to_string(), analysis)
            })
            .collect()
    }
}
