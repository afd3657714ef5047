//! Core data types for prediction backtesting.
//!
//! Two independently timestamped streams feed the engine: predictions emitted
//! by an upstream model and realized prices from a market-data provider. The
//! aligner joins them into [`AlignedPoint`]s, which every later stage consumes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Confidence assumed for predictions that do not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// A single forecast emitted at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// When the prediction was made.
    pub timestamp: DateTime<Utc>,

    /// Predicted price level, if the model emitted one.
    #[serde(default)]
    pub predicted_price: Option<Decimal>,

    /// Predicted percentage move.
    #[serde(default)]
    pub predicted_pct: f64,

    /// Self-reported confidence in [0, 1].
    #[serde(default)]
    pub confidence: Option<f64>,

    /// Auxiliary named scores (e.g. "tech_score").
    #[serde(default)]
    pub pillars: BTreeMap<String, Decimal>,

    /// Free-form label carried through to per-point output.
    #[serde(default)]
    pub category: Option<String>,
}

impl PredictionRecord {
    /// Create a prediction with a price target and no auxiliary data.
    pub fn new(timestamp: DateTime<Utc>, predicted_price: Decimal) -> Self {
        Self {
            timestamp,
            predicted_price: Some(predicted_price),
            predicted_pct: 0.0,
            confidence: None,
            pillars: BTreeMap::new(),
            category: None,
        }
    }

    pub fn with_pct(mut self, predicted_pct: f64) -> Self {
        self.predicted_pct = predicted_pct;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_pillar(mut self, name: &str, score: Decimal) -> Self {
        self.pillars.insert(name.to_string(), score);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Confidence, falling back to [`DEFAULT_CONFIDENCE`].
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }
}

/// A single realized market observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: DateTime<Utc>,
    pub actual_price: Decimal,
}

impl PriceRecord {
    pub fn new(timestamp: DateTime<Utc>, actual_price: Decimal) -> Self {
        Self {
            timestamp,
            actual_price,
        }
    }
}

/// A prediction joined with the nearest realized price.
///
/// Prices are held as `f64` from here on; every metric is computed in floating
/// point. Pillar scores keep their decimal form so that an absent pillar (no
/// key) stays distinct from a pillar scored exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPoint {
    /// Prediction timestamp.
    pub timestamp: DateTime<Utc>,

    /// Timestamp of the price record that was matched.
    pub price_timestamp: DateTime<Utc>,

    pub predicted_price: f64,
    pub predicted_pct: f64,
    pub actual_price: f64,

    /// Confidence with the default already applied.
    pub confidence: f64,

    pub pillars: BTreeMap<String, Decimal>,
    pub category: Option<String>,
}

impl AlignedPoint {
    /// Join a prediction with its matched price.
    ///
    /// Returns `None` when the prediction carries no price target.
    pub fn from_match(prediction: &PredictionRecord, price: &PriceRecord) -> Option<Self> {
        let predicted = prediction.predicted_price?;
        Some(Self {
            timestamp: prediction.timestamp,
            price_timestamp: price.timestamp,
            predicted_price: decimal_to_f64(predicted),
            predicted_pct: prediction.predicted_pct,
            actual_price: decimal_to_f64(price.actual_price),
            confidence: prediction.effective_confidence(),
            pillars: prediction.pillars.clone(),
            category: prediction.category.clone(),
        })
    }

    /// Signed prediction error (predicted - actual).
    pub fn error(&self) -> f64 {
        self.predicted_price - self.actual_price
    }

    pub fn abs_error(&self) -> f64 {
        self.error().abs()
    }

    /// Pillar score as `f64`, or `None` when the pillar is absent on this point.
    pub fn pillar(&self, name: &str) -> Option<f64> {
        self.pillars.get(name).map(|d| decimal_to_f64(*d))
    }
}

/// Lossy decimal conversion; unrepresentable values become NaN rather than zero.
pub fn decimal_to_f64(value: Decimal) -> f64 {
    f64::try_from(value).unwrap_or(f64::NAN)
}
