//! Per-event bar loading.
//!
//! Resolves the minute bars one event trades over. Fallback policy:
//! 1. Primary source has data → use it
//! 2. Primary source reports `NotAvailable` and a fallback is configured →
//!    use the fallback (tagged synthetic)
//! 3. Otherwise → fail with the source's error
//!
//! The fetched series is then cut to the event window, the warm-up offset
//! is applied and the entry price is checked against the minimum.

use chrono::Duration;
use log::{error, warn};
use ratiolab_core::{
    entry_index_after, DataError, Evaluation, HistoricalDataSource, PriceSeries,
};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::window::cut_event_window;

/// Extra calendar days fetched past the window so weekends and holidays
/// still leave a following session in range.
const FETCH_SLACK_DAYS: i64 = 4;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("no bars for '{symbol}' at or after {anchor}")]
    EmptyWindow { symbol: String, anchor: String },

    #[error("warm-up outlasts the window for '{symbol}'")]
    WarmUpTooLong { symbol: String },

    #[error("entry price {price} for '{symbol}' is below the minimum {min}")]
    PriceTooLow {
        symbol: String,
        price: Decimal,
        min: Decimal,
    },
}

/// Window parameters shared by every event of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowOptions {
    pub time_limit: Duration,
    pub warm_up: Duration,
    pub min_entry_price: Decimal,
}

/// Bars for one event, ready for extremum extraction.
#[derive(Debug, Clone)]
pub struct LoadedEvent {
    pub window: PriceSeries,
    /// Index into `window` of the entry bar.
    pub entry_index: usize,
    /// The bars came from the fallback source.
    pub synthetic: bool,
}

/// Load the event window for `evaluation`.
pub fn load_event(
    evaluation: &Evaluation,
    options: &WindowOptions,
    source: &dyn HistoricalDataSource,
    fallback: Option<&dyn HistoricalDataSource>,
) -> Result<LoadedEvent, LoadError> {
    let symbol = evaluation.symbol.as_str();
    let start = evaluation.timestamp;
    let end = start + options.time_limit + Duration::days(FETCH_SLACK_DAYS);

    let (series, synthetic) = match (source.fetch(symbol, start, end), fallback) {
        (Ok(series), _) => (series, false),
        (Err(DataError::NotAvailable { .. }), Some(fallback)) => {
            warn!(
                "no {} data for {symbol}; generating from {} (results will be tagged)",
                source.name(),
                fallback.name()
            );
            (fallback.fetch(symbol, start, end)?, true)
        }
        (Err(e), _) => return Err(e.into()),
    };

    let window = cut_event_window(&series, start, options.time_limit).ok_or_else(|| {
        LoadError::EmptyWindow {
            symbol: symbol.to_string(),
            anchor: start.to_rfc3339(),
        }
    })?;

    let entry_index = entry_index_after(window.bars(), options.warm_up).ok_or_else(|| {
        LoadError::WarmUpTooLong {
            symbol: symbol.to_string(),
        }
    })?;

    let price = window.bars()[entry_index].close;
    if price < options.min_entry_price {
        error!(
            "{symbol} entry price {price} is below {}; skipping {}",
            options.min_entry_price, evaluation.url
        );
        return Err(LoadError::PriceTooLow {
            symbol: symbol.to_string(),
            price,
            min: options.min_entry_price,
        });
    }

    Ok(LoadedEvent {
        window,
        entry_index,
        synthetic,
    })
}
