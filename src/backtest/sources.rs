//! Collaborator interfaces for the two input streams.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::{LoaderError, PredictionRecord, PriceRecord};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies predictions for a date range, ascending by timestamp.
///
/// An empty result is valid and distinct from an error.
#[async_trait]
pub trait PredictionSource: Send + Sync {
    async fn fetch_predictions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>, SourceError>;
}

/// Supplies realized prices for a date range. Ordering is not guaranteed.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, SourceError>;
}

/// Both streams held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    predictions: Arc<Vec<PredictionRecord>>,
    prices: Arc<Vec<PriceRecord>>,
}

impl InMemorySource {
    pub fn new(predictions: Vec<PredictionRecord>, prices: Vec<PriceRecord>) -> Self {
        Self {
            predictions: Arc::new(predictions),
            prices: Arc::new(prices),
        }
    }
}

/// Predictions within `[start, end]`, sorted ascending.
pub(crate) fn predictions_in_range(
    records: &[PredictionRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<PredictionRecord> {
    let mut selected: Vec<_> = records
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= end)
        .cloned()
        .collect();
    selected.sort_by_key(|p| p.timestamp);
    selected
}

/// Prices within `[start, end]`, in input order.
pub(crate) fn prices_in_range(
    records: &[PriceRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<PriceRecord> {
    records
        .iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= end)
        .cloned()
        .collect()
}

#[async_trait]
impl PredictionSource for InMemorySource {
    async fn fetch_predictions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>, SourceError> {
        Ok(predictions_in_range(&self.predictions, start, end))
    }
}

#[async_trait]
impl PriceSource for InMemorySource {
    async fn fetch_prices(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, SourceError> {
        Ok(prices_in_range(&self.prices, start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_range_is_inclusive_and_sorted() {
        let source = InMemorySource::new(
            vec![
                PredictionRecord::new(ts(3), dec!(103)),
                PredictionRecord::new(ts(1), dec!(101)),
                PredictionRecord::new(ts(5), dec!(105)),
                PredictionRecord::new(ts(2), dec!(102)),
            ],
            vec![PriceRecord::new(ts(4), dec!(99)), PriceRecord::new(ts(2), dec!(98))],
        );

        let predictions = source.fetch_predictions(ts(1), ts(3)).await.unwrap();
        let stamps: Vec<_> = predictions.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![ts(1), ts(2), ts(3)]);

        // Prices keep input order.
        let prices = source.fetch_prices(ts(1), ts(5)).await.unwrap();
        assert_eq!(prices[0].timestamp, ts(4));
        assert_eq!(prices[1].timestamp, ts(2));
    }

    #[tokio::test]
    async fn test_empty_range_is_not_an_error() {
        let source = InMemorySource::default();
        assert!(source.fetch_predictions(ts(1), ts(2)).await.unwrap().is_empty());
    }
}
