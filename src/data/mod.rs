//! Input data: record types, JSON loading and demo generation.

pub mod loader;
pub mod synthetic;
pub mod types;

pub use loader::{read_records, write_records, JsonFileSource, LoaderError};
pub use synthetic::{generate, SyntheticConfig, SyntheticData, PILLARS};
pub use types::{decimal_to_f64, AlignedPoint, PredictionRecord, PriceRecord, DEFAULT_CONFIDENCE};
