//! Input integrity checks for prediction and price streams.
//!
//! Validates:
//! - Prediction ordering (ascending timestamps)
//! - Confidence range ([0, 1])
//! - Predicted prices (finite and positive when present)
//! - Actual prices (positive)
//! - Price timestamps (no duplicates)
//!
//! Failures are advisory: the run continues and the checks travel with the
//! report.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::{PredictionRecord, PriceRecord};

/// Offending items listed in a failure's details before truncating.
const MAX_DETAIL_ITEMS: usize = 5;

/// Result of a single validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Outcome of every check over one pair of input streams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub prediction_count: usize,
    pub price_count: usize,
    pub checks: Vec<CheckResult>,
}

impl IntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!(
            "{} predictions, {} prices: {}/{} checks passed",
            self.prediction_count,
            self.price_count,
            passed,
            self.checks.len()
        )
    }
}

/// Validator for raw prediction and price inputs.
pub struct InputIntegrityValidator;

impl InputIntegrityValidator {
    /// Run all validation checks.
    pub fn validate(predictions: &[PredictionRecord], prices: &[PriceRecord]) -> IntegrityReport {
        let checks = vec![
            Self::check_prediction_order(predictions),
            Self::check_confidence_range(predictions),
            Self::check_predicted_prices(predictions),
            Self::check_actual_prices(prices),
            Self::check_duplicate_price_timestamps(prices),
        ];

        IntegrityReport {
            prediction_count: predictions.len(),
            price_count: prices.len(),
            checks,
        }
    }

    fn check_prediction_order(predictions: &[PredictionRecord]) -> CheckResult {
        let out_of_order: Vec<String> = predictions
            .windows(2)
            .filter(|pair| pair[1].timestamp < pair[0].timestamp)
            .map(|pair| format!("{} after {}", pair[1].timestamp, pair[0].timestamp))
            .collect();

        if out_of_order.is_empty() {
            CheckResult::pass("prediction_order", "Predictions are in ascending order")
        } else {
            CheckResult::fail(
                "prediction_order",
                &format!("{} predictions out of order", out_of_order.len()),
                Some(truncated(&out_of_order)),
            )
        }
    }

    fn check_confidence_range(predictions: &[PredictionRecord]) -> CheckResult {
        let invalid: Vec<String> = predictions
            .iter()
            .filter_map(|p| p.confidence.map(|c| (p.timestamp, c)))
            .filter(|(_, c)| !(0.0..=1.0).contains(c))
            .map(|(ts, c)| format!("{}: {}", ts, c))
            .collect();

        if invalid.is_empty() {
            CheckResult::pass("confidence_range", "All confidences within [0, 1]")
        } else {
            CheckResult::fail(
                "confidence_range",
                &format!("{} confidences outside [0, 1]", invalid.len()),
                Some(truncated(&invalid)),
            )
        }
    }

    fn check_predicted_prices(predictions: &[PredictionRecord]) -> CheckResult {
        let missing = predictions.iter().filter(|p| p.predicted_price.is_none()).count();
        let invalid: Vec<String> = predictions
            .iter()
            .filter_map(|p| p.predicted_price.map(|price| (p.timestamp, price)))
            .filter(|(_, price)| *price <= Decimal::ZERO)
            .map(|(ts, price)| format!("{}: {}", ts, price))
            .collect();

        if !invalid.is_empty() {
            return CheckResult::fail(
                "predicted_price_validity",
                &format!("{} non-positive predicted prices", invalid.len()),
                Some(truncated(&invalid)),
            );
        }

        let message = if missing == 0 {
            "All predicted prices positive".to_string()
        } else {
            format!("Predicted prices positive ({} predictions without a target)", missing)
        };
        CheckResult::pass("predicted_price_validity", &message)
    }

    fn check_actual_prices(prices: &[PriceRecord]) -> CheckResult {
        let invalid: Vec<String> = prices
            .iter()
            .filter(|p| p.actual_price <= Decimal::ZERO)
            .map(|p| format!("{}: {}", p.timestamp, p.actual_price))
            .collect();

        if invalid.is_empty() {
            CheckResult::pass("actual_price_validity", "All actual prices positive")
        } else {
            CheckResult::fail(
                "actual_price_validity",
                &format!("{} non-positive actual prices", invalid.len()),
                Some(truncated(&invalid)),
            )
        }
    }

    fn check_duplicate_price_timestamps(prices: &[PriceRecord]) -> CheckResult {
        let mut seen = HashSet::with_capacity(prices.len());
        let duplicates: Vec<String> = prices
            .iter()
            .filter(|p| !seen.insert(p.timestamp))
            .map(|p| p.timestamp.to_string())
            .collect();

        if duplicates.is_empty() {
            CheckResult::pass("price_timestamps_unique", "No duplicate price timestamps")
        } else {
            CheckResult::fail(
                "price_timestamps_unique",
                &format!("{} duplicate price timestamps", duplicates.len()),
                Some(truncated(&duplicates)),
            )
        }
    }
}

fn truncated(items: &[String]) -> String {
    let shown = items.iter().take(MAX_DETAIL_ITEMS).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > MAX_DETAIL_ITEMS {
        format!("{}, ... ({} more)", shown, items.len() - MAX_DETAIL_ITEMS)
    } else {
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn check<'a>(report: &'a IntegrityReport, name: &str) -> &'a CheckResult {
        report.checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_check_result() {
        let pass = CheckResult::pass("test", "passed");
        assert!(pass.passed);

        let fail = CheckResult::fail("test", "failed", Some("details".to_string()));
        assert!(!fail.passed);
        assert_eq!(fail.details, Some("details".to_string()));
    }

    #[test]
    fn test_clean_inputs_pass() {
        let predictions = vec![
            PredictionRecord::new(ts(1), dec!(100)).with_confidence(0.8),
            PredictionRecord::new(ts(2), dec!(101)),
        ];
        let prices = vec![PriceRecord::new(ts(1), dec!(99)), PriceRecord::new(ts(2), dec!(100))];

        let report = InputIntegrityValidator::validate(&predictions, &prices);
        assert!(report.all_passed());
        assert_eq!(report.checks.len(), 5);
        assert_eq!(report.summary(), "2 predictions, 2 prices: 5/5 checks passed");
    }

    #[test]
    fn test_detects_bad_inputs() {
        let mut no_target = PredictionRecord::new(ts(3), dec!(1));
        no_target.predicted_price = None;
        let predictions = vec![
            PredictionRecord::new(ts(2), dec!(100)).with_confidence(1.5),
            PredictionRecord::new(ts(1), dec!(-4)),
            no_target,
        ];
        let prices = vec![
            PriceRecord::new(ts(1), dec!(0)),
            PriceRecord::new(ts(1), dec!(100)),
        ];

        let report = InputIntegrityValidator::validate(&predictions, &prices);
        assert!(!report.all_passed());
        assert_eq!(report.failed_checks().len(), 5);
        assert!(!check(&report, "prediction_order").passed);
        assert!(!check(&report, "confidence_range").passed);
        assert!(!check(&report, "predicted_price_validity").passed);
        assert!(!check(&report, "actual_price_validity").passed);
        assert!(!check(&report, "price_timestamps_unique").passed);
    }

    #[test]
    fn test_missing_target_is_not_a_failure() {
        let mut no_target = PredictionRecord::new(ts(1), dec!(1));
        no_target.predicted_price = None;

        let report = InputIntegrityValidator::validate(&[no_target], &[]);
        let result = check(&report, "predicted_price_validity");
        assert!(result.passed);
        assert!(result.message.contains("1 predictions without a target"));
    }

    #[test]
    fn test_details_are_truncated() {
        let items: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        assert_eq!(truncated(&items), "0, 1, 2, 3, 4, ... (3 more)");
        assert_eq!(truncated(&items[..2]), "0, 1");
    }
}
