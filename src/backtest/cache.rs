//! Holder for the most recent completed report.

use std::sync::Arc;

use parking_lot::RwLock;

use super::engine::BacktestReport;

/// Last-report slot shared between a runner and its readers.
///
/// Reports are swapped in whole; a reader holds an `Arc` to a finished report
/// and never observes one mid-write.
#[derive(Debug, Default)]
pub struct ReportCache {
    latest: RwLock<Option<Arc<BacktestReport>>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, report: Arc<BacktestReport>) {
        *self.latest.write() = Some(report);
    }

    pub fn latest(&self) -> Option<Arc<BacktestReport>> {
        self.latest.read().clone()
    }
}
