//! Historical data source trait and its error type.
//!
//! The kernel never fetches data itself. Orchestration code hands it bars
//! from an implementation of [`HistoricalDataSource`]; tests use in-memory
//! fakes.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::domain::PriceSeries;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data available for '{symbol}'")]
    NotAvailable { symbol: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Minute-bar provider.
///
/// Implementations must return bars at minute granularity with
/// timezone-aware timestamps, already gap-filled: missing minutes carry the
/// previous close with zero volume.
pub trait HistoricalDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Bars for `symbol` with timestamps in `[start, end]`.
    fn fetch(
        &self,
        symbol: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<PriceSeries, DataError>;
}
