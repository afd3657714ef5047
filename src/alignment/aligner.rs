//! Nearest-timestamp alignment of predictions against realized prices.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::data::{AlignedPoint, PredictionRecord, PriceRecord};

/// Default maximum distance between a prediction and its matched price.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 60;

/// Matches each prediction to the closest price record.
#[derive(Debug, Clone)]
pub struct TimeSeriesAligner {
    tolerance: Duration,
}

impl Default for TimeSeriesAligner {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TOLERANCE_MINUTES))
    }
}

impl TimeSeriesAligner {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Align predictions with prices.
    ///
    /// Every price is scanned for every prediction; the match is accepted when
    /// its distance is within the tolerance (inclusive). Equidistant prices
    /// resolve to the first one in `prices` order. Output keeps prediction
    /// order. Predictions with no acceptable match, or with no price target,
    /// are dropped.
    pub fn align(
        &self,
        predictions: &[PredictionRecord],
        prices: &[PriceRecord],
    ) -> Vec<AlignedPoint> {
        if predictions.is_empty() || prices.is_empty() {
            return Vec::new();
        }

        let mut aligned = Vec::with_capacity(predictions.len());
        let mut out_of_tolerance = 0usize;
        let mut missing_target = 0usize;

        for prediction in predictions {
            let Some((price, distance)) = nearest_price(prediction.timestamp, prices) else {
                continue;
            };

            if distance > self.tolerance {
                out_of_tolerance += 1;
                continue;
            }

            match AlignedPoint::from_match(prediction, price) {
                Some(point) => aligned.push(point),
                None => missing_target += 1,
            }
        }

        debug!(
            aligned = aligned.len(),
            out_of_tolerance,
            missing_target,
            tolerance_minutes = self.tolerance.num_minutes(),
            "Aligned predictions with prices"
        );

        aligned
    }
}

/// Closest price to `timestamp`; the first of several equidistant records wins.
fn nearest_price(
    timestamp: DateTime<Utc>,
    prices: &[PriceRecord],
) -> Option<(&PriceRecord, Duration)> {
    let mut best: Option<(&PriceRecord, Duration)> = None;

    for price in prices {
        let distance = abs_duration(price.timestamp - timestamp);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((price, distance)),
        }
    }

    best
}

fn abs_duration(d: Duration) -> Duration {
    if d < Duration::zero() {
        -d
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    fn prediction(hour: u32, minute: u32) -> PredictionRecord {
        PredictionRecord::new(at(hour, minute), dec!(100))
    }

    fn price(hour: u32, minute: u32, value: Decimal) -> PriceRecord {
        PriceRecord::new(at(hour, minute), value)
    }

    #[test]
    fn test_selects_closest_price() {
        // 09:00 sits exactly on the tolerance boundary but 09:59 is closer.
        let aligner = TimeSeriesAligner::default();
        let prices = vec![price(9, 0, dec!(90)), price(9, 59, dec!(99))];

        let aligned = aligner.align(&[prediction(10, 0)], &prices);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].price_timestamp, at(9, 59));
        assert_eq!(aligned[0].actual_price, 99.0);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let aligner = TimeSeriesAligner::default();
        let aligned = aligner.align(&[prediction(10, 0)], &[price(11, 0, dec!(101))]);
        assert_eq!(aligned.len(), 1);

        let aligned = aligner.align(&[prediction(10, 0)], &[price(11, 1, dec!(101))]);
        assert!(aligned.is_empty());
    }

    #[test]
    fn test_equidistant_prices_pick_first_in_input_order() {
        let aligner = TimeSeriesAligner::default();
        let prices = vec![price(10, 30, dec!(105)), price(9, 30, dec!(95))];

        let aligned = aligner.align(&[prediction(10, 0)], &prices);
        assert_eq!(aligned[0].actual_price, 105.0);

        let reversed: Vec<_> = prices.into_iter().rev().collect();
        let aligned = aligner.align(&[prediction(10, 0)], &reversed);
        assert_eq!(aligned[0].actual_price, 95.0);
    }

    #[test]
    fn test_empty_inputs_yield_empty_output() {
        let aligner = TimeSeriesAligner::default();
        assert!(aligner.align(&[prediction(10, 0)], &[]).is_empty());
        assert!(aligner.align(&[], &[price(10, 0, dec!(100))]).is_empty());
    }

    #[test]
    fn test_preserves_prediction_order_and_drops_unmatched() {
        let aligner = TimeSeriesAligner::new(Duration::minutes(15));
        let predictions = vec![prediction(8, 0), prediction(12, 0), prediction(10, 0)];
        let prices = vec![price(10, 5, dec!(100)), price(12, 10, dec!(102))];

        let aligned = aligner.align(&predictions, &prices);
        let stamps: Vec<_> = aligned.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![at(12, 0), at(10, 0)]);
    }

    #[test]
    fn test_matches_are_within_tolerance_and_nearest() {
        let aligner = TimeSeriesAligner::new(Duration::minutes(20));
        let predictions: Vec<_> = (0..24).map(|h| prediction(h, 0)).collect();
        let prices: Vec<_> = (0..24)
            .flat_map(|h| [price(h, (h * 7) % 60, dec!(100)), price(h, (h * 13) % 60, dec!(101))])
            .collect();

        for point in aligner.align(&predictions, &prices) {
            let chosen = abs_duration(point.price_timestamp - point.timestamp);
            assert!(chosen <= aligner.tolerance());
            for p in &prices {
                assert!(abs_duration(p.timestamp - point.timestamp) >= chosen);
            }
        }
    }

    #[test]
    fn test_prediction_without_target_is_dropped() {
        let aligner = TimeSeriesAligner::default();
        let mut no_target = prediction(10, 0);
        no_target.predicted_price = None;

        let aligned = aligner.align(&[no_target, prediction(11, 0)], &[price(10, 30, dec!(100))]);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].timestamp, at(11, 0));
    }
}
