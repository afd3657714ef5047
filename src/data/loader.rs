//! JSON file loader for prediction and price streams.
//!
//! Each file holds a JSON array of records:
//! - predictions: `timestamp`, `predicted_price`, optional `predicted_pct`,
//!   `confidence`, `pillars`, `category`
//! - prices: `timestamp`, `actual_price`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::types::{PredictionRecord, PriceRecord};
use crate::backtest::sources::{predictions_in_range, prices_in_range};
use crate::backtest::{PredictionSource, PriceSource, SourceError};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid data in {path}: {source}")]
    InvalidData {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads both streams from JSON files on each fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    predictions_path: PathBuf,
    prices_path: PathBuf,
}

impl JsonFileSource {
    pub fn new(predictions_path: impl Into<PathBuf>, prices_path: impl Into<PathBuf>) -> Self {
        Self {
            predictions_path: predictions_path.into(),
            prices_path: prices_path.into(),
        }
    }

    pub async fn load_predictions(&self) -> Result<Vec<PredictionRecord>, LoaderError> {
        read_records(&self.predictions_path).await
    }

    pub async fn load_prices(&self) -> Result<Vec<PriceRecord>, LoaderError> {
        read_records(&self.prices_path).await
    }

    /// First and last prediction timestamps, or `None` for an empty file.
    pub async fn prediction_span(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, LoaderError> {
        let predictions = self.load_predictions().await?;
        let first = predictions.iter().map(|p| p.timestamp).min();
        let last = predictions.iter().map(|p| p.timestamp).max();
        Ok(first.zip(last))
    }
}

#[async_trait]
impl PredictionSource for JsonFileSource {
    async fn fetch_predictions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>, SourceError> {
        let records = self.load_predictions().await?;
        Ok(predictions_in_range(&records, start, end))
    }
}

#[async_trait]
impl PriceSource for JsonFileSource {
    async fn fetch_prices(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, SourceError> {
        let records = self.load_prices().await?;
        Ok(prices_in_range(&records, start, end))
    }
}

/// Read a JSON array of records.
pub async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LoaderError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    let bytes = tokio::fs::read(path).await?;
    let records: Vec<T> = serde_json::from_slice(&bytes).map_err(|source| LoaderError::InvalidData {
        path: path.display().to_string(),
        source,
    })?;
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Write records as a pretty-printed JSON array, creating parent directories.
pub async fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), LoaderError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(records).map_err(|source| LoaderError::InvalidData {
        path: path.display().to_string(),
        source,
    })?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    #[tokio::test]
    async fn test_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let predictions_path = dir.path().join("in/predictions.json");
        let prices_path = dir.path().join("in/prices.json");

        let predictions = vec![
            PredictionRecord::new(ts(2), dec!(102)).with_pillar("tech_score", dec!(41.5)),
            PredictionRecord::new(ts(0), dec!(100)).with_confidence(0.7),
            PredictionRecord::new(ts(5), dec!(105)),
        ];
        let prices = vec![PriceRecord::new(ts(0), dec!(99.5)), PriceRecord::new(ts(2), dec!(101))];
        write_records(&predictions_path, &predictions).await.unwrap();
        write_records(&prices_path, &prices).await.unwrap();

        let source = JsonFileSource::new(&predictions_path, &prices_path);
        let fetched = source.fetch_predictions(ts(0), ts(3)).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].timestamp, ts(0));
        assert_eq!(fetched[0].confidence, Some(0.7));
        assert_eq!(fetched[1].pillars["tech_score"], dec!(41.5));

        assert_eq!(source.fetch_prices(ts(0), ts(3)).await.unwrap(), prices);
        assert_eq!(source.prediction_span().await.unwrap(), Some((ts(0), ts(5))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = JsonFileSource::new("/nonexistent/p.json", "/nonexistent/q.json");
        assert!(matches!(
            source.load_predictions().await,
            Err(LoaderError::FileNotFound(_))
        ));
        assert!(matches!(
            source.fetch_prices(ts(0), ts(1)).await,
            Err(SourceError::Loader(LoaderError::FileNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        tokio::fs::write(&path, b"{\"not\": \"an array\"}").await.unwrap();

        let result: Result<Vec<PriceRecord>, _> = read_records(&path).await;
        assert!(matches!(result, Err(LoaderError::InvalidData { .. })));
    }
}
