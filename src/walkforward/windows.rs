//! Walk-forward window generation.
//!
//! Slices an aligned series into rolling train/test windows. Sizes are point
//! counts; converting calendar spans to counts is the caller's job
//! ([`WindowSizing::from_days`]).

use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::data::AlignedPoint;

/// Smallest train slice that yields a meaningful window.
pub const MIN_TRAIN_SIZE: usize = 24;

/// Smallest test slice that yields a meaningful window.
pub const MIN_TEST_SIZE: usize = 6;

/// Points per calendar day assumed when converting spans (hourly data).
pub const DEFAULT_POINTS_PER_DAY: usize = 24;

/// Train/test slice lengths in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSizing {
    pub train_size: usize,
    pub test_size: usize,
}

impl WindowSizing {
    pub fn new(train_size: usize, test_size: usize) -> Self {
        Self {
            train_size,
            test_size,
        }
    }

    /// Convert day counts into point counts.
    pub fn from_days(train_days: u32, test_days: u32, points_per_day: usize) -> Self {
        Self::new(
            train_days as usize * points_per_day,
            test_days as usize * points_per_day,
        )
    }

    /// Convert calendar spans into point counts, rounding down.
    pub fn from_durations(train: Duration, test: Duration, points_per_day: usize) -> Self {
        Self::new(
            span_to_points(train, points_per_day),
            span_to_points(test, points_per_day),
        )
    }

    /// Points needed for a single window.
    pub fn required_points(&self) -> usize {
        self.train_size + self.test_size
    }
}

fn span_to_points(span: Duration, points_per_day: usize) -> usize {
    let seconds = span.num_seconds().max(0) as u128;
    (seconds * points_per_day as u128 / 86_400) as usize
}

/// A single walk-forward window over an aligned series.
///
/// Slices borrow from the aligned series, so windows are cheap to create and
/// can be scored from several threads at once.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    /// Window number (1-indexed, generation order).
    pub window_id: usize,
    /// Index of the first training point in the aligned series.
    pub offset: usize,
    pub train_start: DateTime<Utc>,
    pub train_end: DateTime<Utc>,
    pub test_start: DateTime<Utc>,
    pub test_end: DateTime<Utc>,
    pub train_data: &'a [AlignedPoint],
    pub test_data: &'a [AlignedPoint],
}

impl Window<'_> {
    /// Index range of the train slice in the aligned series.
    pub fn train_range(&self) -> Range<usize> {
        self.offset..self.offset + self.train_data.len()
    }

    /// Index range of the test slice in the aligned series.
    pub fn test_range(&self) -> Range<usize> {
        let start = self.offset + self.train_data.len();
        start..start + self.test_data.len()
    }
}

/// Generator for walk-forward windows.
#[derive(Debug, Clone)]
pub struct WindowGenerator {
    sizing: WindowSizing,
    min_train_size: usize,
    min_test_size: usize,
}

impl WindowGenerator {
    /// Create a generator with the default minimum-size guard.
    pub fn new(sizing: WindowSizing) -> Self {
        Self {
            sizing,
            min_train_size: MIN_TRAIN_SIZE,
            min_test_size: MIN_TEST_SIZE,
        }
    }

    /// Override the minimum-size guard.
    pub fn with_minimums(mut self, min_train_size: usize, min_test_size: usize) -> Self {
        self.min_train_size = min_train_size;
        self.min_test_size = min_test_size;
        self
    }

    pub fn sizing(&self) -> WindowSizing {
        self.sizing
    }

    /// Whether the configured sizes clear the minimum-size guard.
    pub fn is_viable(&self) -> bool {
        self.sizing.train_size >= self.min_train_size.max(1)
            && self.sizing.test_size >= self.min_test_size.max(1)
    }

    /// Generate all complete windows.
    ///
    /// The start index advances by the test size, so consecutive test slices
    /// are disjoint and a partial trailing window is never emitted.
    pub fn generate<'a>(&self, aligned: &'a [AlignedPoint]) -> Vec<Window<'a>> {
        if !self.is_viable() {
            return Vec::new();
        }

        let train = self.sizing.train_size;
        let test = self.sizing.test_size;
        let mut windows = Vec::with_capacity(self.expected_windows(aligned.len()));
        let mut offset = 0;

        while offset + train + test <= aligned.len() {
            let train_data = &aligned[offset..offset + train];
            let test_data = &aligned[offset + train..offset + train + test];

            windows.push(Window {
                window_id: windows.len() + 1,
                offset,
                train_start: train_data[0].timestamp,
                train_end: train_data[train - 1].timestamp,
                test_start: test_data[0].timestamp,
                test_end: test_data[test - 1].timestamp,
                train_data,
                test_data,
            });

            offset += test;
        }

        windows
    }

    /// Number of windows [`generate`](Self::generate) yields for `n` points.
    pub fn expected_windows(&self, n: usize) -> usize {
        let required = self.sizing.required_points();
        if !self.is_viable() || n < required {
            return 0;
        }
        (n - required) / self.sizing.test_size + 1
    }
}

/// Convenience wrapper around [`WindowGenerator`] with default guards.
pub fn make_windows(
    aligned: &[AlignedPoint],
    train_size: usize,
    test_size: usize,
) -> Vec<Window<'_>> {
    WindowGenerator::new(WindowSizing::new(train_size, test_size)).generate(aligned)
}
