//! Validation of raw inputs before a backtest run.
//!
//! Checks ordering, value ranges and duplicate timestamps. Failures are
//! reported, never fatal.

pub mod integrity;

pub use integrity::{CheckResult, InputIntegrityValidator, IntegrityReport};
