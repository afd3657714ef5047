//! Report persistence.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::engine::BacktestReport;

const REPORT_PREFIX: &str = "backtest_";
const REPORT_EXTENSION: &str = "json";

/// Suffixed names tried when reports share a timestamp.
const MAX_NAME_ATTEMPTS: u32 = 999;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store rejected report: {0}")]
    Rejected(String),
}

/// Destination for completed reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &BacktestReport) -> Result<(), StoreError>;
}

/// Writes each report as pretty JSON to `<dir>/backtest_<timestamp>.json`.
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    dir: PathBuf,
}

impl JsonReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a report is written to when no other report has its timestamp.
    /// Timestamps sort lexically.
    pub fn report_path(&self, report: &BacktestReport) -> PathBuf {
        self.numbered_path(report, 0)
    }

    /// `backtest_<timestamp>_<n>.json` for n > 0; sorts after the unsuffixed name.
    fn numbered_path(&self, report: &BacktestReport, n: u32) -> PathBuf {
        let stamp = report.generated_at.format("%Y%m%dT%H%M%S%.3fZ");
        let name = if n == 0 {
            format!("{}{}.{}", REPORT_PREFIX, stamp, REPORT_EXTENSION)
        } else {
            format!("{}{}_{:03}.{}", REPORT_PREFIX, stamp, n, REPORT_EXTENSION)
        };
        self.dir.join(name)
    }

    /// Load a stored report.
    pub async fn load(path: impl AsRef<Path>) -> Result<BacktestReport, StoreError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Stored report files, newest first.
    pub async fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(REPORT_PREFIX))
                && path.extension().and_then(|e| e.to_str()) == Some(REPORT_EXTENSION);
            if is_report {
                paths.push(path);
            }
        }

        paths.sort();
        paths.reverse();
        Ok(paths)
    }

    /// Up to `limit` readable reports, newest first. Unreadable files are
    /// logged and skipped.
    pub async fn history(&self, limit: usize) -> Result<Vec<BacktestReport>, StoreError> {
        let mut reports = Vec::new();
        for path in self.list().await? {
            if reports.len() >= limit {
                break;
            }
            match Self::load(&path).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Skipping unreadable report {}: {}", path.display(), e),
            }
        }
        Ok(reports)
    }
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn save(&self, report: &BacktestReport) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(report)?;

        let mut attempt = 0;
        loop {
            let path = self.numbered_path(report, attempt);
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(mut file) => {
                    file.write_all(&json).await?;
                    file.flush().await?;
                    debug!(path = %path.display(), "Saved backtest report");
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Keeps reports in memory. Can be switched to reject every save.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: Mutex<Vec<BacktestReport>>,
    reject: bool,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save fails.
    pub fn rejecting() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    pub fn reports(&self) -> Vec<BacktestReport> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, report: &BacktestReport) -> Result<(), StoreError> {
        if self.reject {
            return Err(StoreError::Rejected("store is read-only".to_string()));
        }
        self.reports.lock().push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::engine::RunConfiguration;
    use crate::metrics::AggregateReport;
    use crate::validation::IntegrityReport;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn report(generated_at: DateTime<Utc>, window_count: usize) -> BacktestReport {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BacktestReport {
            start_date: start,
            end_date: start + Duration::days(40),
            configuration: RunConfiguration {
                train_window_days: 30.0,
                test_window_days: 7.0,
                train_size: 720,
                test_size: 168,
                points_per_day: 24,
                alignment_tolerance_minutes: 60,
            },
            window_count,
            total_aligned_points: 960,
            aggregate: AggregateReport::default(),
            windows: Vec::new(),
            integrity: IntegrityReport::default(),
            generated_at,
        }
    }

    #[tokio::test]
    async fn test_json_store_history_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path().join("reports"));
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        for i in 0..3 {
            store.save(&report(base + Duration::minutes(i), i as usize)).await.unwrap();
        }
        // Unrelated files are ignored.
        tokio::fs::write(store.dir().join("notes.txt"), b"x").await.unwrap();

        let history = store.history(2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].window_count, 2);
        assert_eq!(history[1].window_count, 1);
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_json_store_report_path() {
        let store = JsonReportStore::new("/tmp/reports");
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 5).unwrap();
        let path = store.report_path(&report(at, 0));
        assert_eq!(path, PathBuf::from("/tmp/reports/backtest_20240601T123005.000Z.json"));
    }

    #[tokio::test]
    async fn test_history_skips_unreadable_reports() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path());
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        store.save(&report(base, 1)).await.unwrap();
        store.save(&report(base + Duration::minutes(2), 3)).await.unwrap();
        // Truncated write sitting between the two good reports.
        let corrupt = store.report_path(&report(base + Duration::minutes(1), 0));
        tokio::fs::write(&corrupt, b"{").await.unwrap();

        let history = store.history(10).await.unwrap();
        let counts: Vec<_> = history.iter().map(|r| r.window_count).collect();
        assert_eq!(counts, vec![3, 1]);

        let limited = store.history(2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_same_timestamp_reports_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 5).unwrap();

        store.save(&report(at, 1)).await.unwrap();
        store.save(&report(at, 2)).await.unwrap();

        let paths = store.list().await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1], store.report_path(&report(at, 0)));
        assert_eq!(
            paths[0].file_name().unwrap(),
            "backtest_20240601T123005.000Z_001.json"
        );

        // The later save is listed first.
        let history = store.history(10).await.unwrap();
        let counts: Vec<_> = history.iter().map(|r| r.window_count).collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_missing_directory_has_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path().join("absent"));
        assert!(store.history(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path());
        let saved = report(Utc::now(), 4);
        store.save(&saved).await.unwrap();

        let loaded = JsonReportStore::load(store.report_path(&saved)).await.unwrap();
        assert_eq!(loaded.window_count, 4);
        assert_eq!(loaded.configuration, saved.configuration);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryReportStore::new();
        store.save(&report(Utc::now(), 1)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.reports()[0].window_count, 1);

        let rejecting = InMemoryReportStore::rejecting();
        assert!(matches!(
            rejecting.save(&report(Utc::now(), 1)).await,
            Err(StoreError::Rejected(_))
        ));
        assert!(rejecting.is_empty());
    }
}
