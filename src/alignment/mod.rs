//! Time-series alignment.
//!
//! Joins the prediction stream with the price stream by nearest timestamp,
//! within a configurable tolerance.

pub mod aligner;

pub use aligner::{TimeSeriesAligner, DEFAULT_TOLERANCE_MINUTES};
