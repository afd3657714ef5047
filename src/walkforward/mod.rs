//! Walk-forward validation module.
//!
//! Splits an aligned series into rolling windows:
//! - Train: trailing history (30 days by default)
//! - Test: the slice being scored (7 days by default)
//! - Roll: by the test size, so test slices never overlap

pub mod windows;

pub use windows::{
    make_windows, Window, WindowGenerator, WindowSizing, DEFAULT_POINTS_PER_DAY, MIN_TEST_SIZE,
    MIN_TRAIN_SIZE,
};
