//! Deterministic demo data.
//!
//! Produces an hourly prediction stream and a matching price stream whose
//! ticks land a few minutes after each prediction. The series are smooth
//! trigonometric paths, so the same parameters always give the same data.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::types::{PredictionRecord, PriceRecord};

/// Pillar names carried by generated predictions.
pub const PILLARS: [&str; 4] = ["tech_score", "social_score", "fund_score", "astro_score"];

/// Parameters for [`generate`].
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub start: DateTime<Utc>,
    pub hours: usize,
    pub base_price: f64,
    /// Phase offset; different values give different but repeatable paths.
    pub phase: f64,
    /// Delay between a prediction and its price tick.
    pub price_lag: Duration,
    /// Every n-th prediction omits `astro_score` (0 disables).
    pub sparse_pillar_every: usize,
}

impl SyntheticConfig {
    pub fn new(start: DateTime<Utc>, hours: usize) -> Self {
        Self {
            start,
            hours,
            base_price: 450.0,
            phase: 0.0,
            price_lag: Duration::minutes(3),
            sparse_pillar_every: 5,
        }
    }
}

/// Generated prediction and price streams.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub predictions: Vec<PredictionRecord>,
    pub prices: Vec<PriceRecord>,
}

pub fn generate(config: &SyntheticConfig) -> SyntheticData {
    let mut predictions = Vec::with_capacity(config.hours);
    let mut prices = Vec::with_capacity(config.hours);

    let price_at = |i: usize| {
        let t = i as f64 + config.phase;
        config.base_price * (1.0 + 0.02 * (t / 24.0).sin() + 0.005 * (t / 3.0).cos())
    };

    for i in 0..config.hours {
        let t = i as f64 + config.phase;
        let timestamp = config.start + Duration::hours(i as i64);
        let actual = price_at(i);
        let trend = (t / 24.0).cos();

        let tech = (35.0 + 5.0 * trend + 8.0 * (t * 0.7).sin()).clamp(0.0, 100.0);
        let social = (32.0 + 2.0 * trend + 6.0 * (t * 1.3).cos()).clamp(0.0, 100.0);
        let fund = (33.0 + 5.0 * (t * 0.11).sin()).clamp(0.0, 100.0);
        let astro = (60.0 + 10.0 * (t * 0.37).cos()).clamp(0.0, 100.0);

        let signal = ((tech - 50.0) / 50.0 * 0.2
            + (social - 50.0) / 50.0 * 0.1
            + (astro - 50.0) / 50.0 * 0.2
            + 0.3 * trend)
            .clamp(-1.0, 1.0);
        let confidence = (signal.abs() + 0.2 + 0.1 * (t * 0.5).sin()).clamp(0.0, 1.0);

        // Forecast drifts toward the next tick, with error growing as the
        // tech pillar weakens.
        let next = price_at(i + 1);
        let noise = (1.0 - tech / 100.0) * 0.004 * actual * (t * 2.1).sin();
        let predicted = next + noise;

        let mut prediction = PredictionRecord::new(timestamp, to_decimal(predicted, 2))
            .with_pct(100.0 * (predicted - actual) / actual)
            .with_confidence(confidence)
            .with_pillar("tech_score", to_decimal(tech, 2))
            .with_pillar("social_score", to_decimal(social, 2))
            .with_pillar("fund_score", to_decimal(fund, 2))
            .with_category(if signal >= 0.0 { "bullish" } else { "bearish" });
        if config.sparse_pillar_every == 0 || i % config.sparse_pillar_every != 0 {
            prediction = prediction.with_pillar("astro_score", to_decimal(astro, 2));
        }

        predictions.push(prediction);
        prices.push(PriceRecord::new(timestamp + config.price_lag, to_decimal(actual, 2)));
    }

    SyntheticData {
        predictions,
        prices,
    }
}

fn to_decimal(value: f64, dp: u32) -> Decimal {
    Decimal::try_from(value).map(|d| d.round_dp(dp)).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::TimeSeriesAligner;
    use chrono::TimeZone;

    fn config(hours: usize) -> SyntheticConfig {
        SyntheticConfig::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), hours)
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate(&config(48));
        let b = generate(&config(48));
        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.prices, b.prices);
    }

    #[test]
    fn test_shape() {
        let data = generate(&config(100));
        assert_eq!(data.predictions.len(), 100);
        assert_eq!(data.prices.len(), 100);
        assert!(data.predictions.windows(2).all(|p| p[0].timestamp < p[1].timestamp));
        assert!(data.prices.iter().all(|p| p.actual_price > Decimal::ZERO));

        for p in &data.predictions {
            let c = p.confidence.unwrap();
            assert!((0.0..=1.0).contains(&c));
            for name in &PILLARS[..3] {
                assert!(p.pillars.contains_key(*name));
            }
        }

        // Every fifth prediction leaves out the astro pillar.
        let missing = data
            .predictions
            .iter()
            .filter(|p| !p.pillars.contains_key("astro_score"))
            .count();
        assert_eq!(missing, 20);
    }

    #[test]
    fn test_every_prediction_aligns() {
        let data = generate(&config(72));
        let aligned = TimeSeriesAligner::default().align(&data.predictions, &data.prices);
        assert_eq!(aligned.len(), 72);
        assert!(aligned.iter().all(|p| p.price_timestamp - p.timestamp == Duration::minutes(3)));
    }
}
