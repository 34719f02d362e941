//! PriceBar and PriceSeries — the market data handed to extremum extraction.

use chrono::{DateTime, Duration, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV sample for a single symbol.
///
/// Timestamps are timezone-aware and minute-resolution. Bars are produced by
/// a data source and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<FixedOffset>,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    pub volume: u64,
}

impl PriceBar {
    /// Basic OHLC sanity check: high bounds everything, low is bounded by
    /// everything, close is positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > Decimal::ZERO
    }

    /// A flat filler bar at `timestamp` carrying `close` on every price field.
    pub fn flat(timestamp: DateTime<FixedOffset>, close: Decimal) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("bar at index {index} ({timestamp}) is not after its predecessor")]
    Unordered {
        index: usize,
        timestamp: DateTime<FixedOffset>,
    },

    #[error("gap-fill interval must be positive")]
    NonPositiveInterval,
}

/// Contiguous, strictly time-ordered bars for one symbol over one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PriceBar>", into = "Vec<PriceBar>")]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl TryFrom<Vec<PriceBar>> for PriceSeries {
    type Error = SeriesError;

    fn try_from(bars: Vec<PriceBar>) -> Result<Self, Self::Error> {
        Self::new(bars)
    }
}

impl From<PriceSeries> for Vec<PriceBar> {
    fn from(series: PriceSeries) -> Self {
        series.bars
    }
}

impl PriceSeries {
    /// Wrap `bars`, rejecting duplicate or out-of-order timestamps.
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::Unordered {
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Insert one flat bar per missing `interval`, forward-filled from the
    /// previous close with zero volume.
    pub fn fill_gaps(self, interval: Duration) -> Result<Self, SeriesError> {
        if interval <= Duration::zero() {
            return Err(SeriesError::NonPositiveInterval);
        }
        Ok(self.forward_fill(interval))
    }

    /// [`fill_gaps`](Self::fill_gaps) at one-minute granularity.
    pub fn fill_minute_gaps(self) -> Self {
        self.forward_fill(Duration::minutes(1))
    }

    fn forward_fill(self, interval: Duration) -> Self {
        let mut filled: Vec<PriceBar> = Vec::with_capacity(self.bars.len());
        for bar in self.bars {
            if let Some(prev) = filled.last() {
                let close = prev.close;
                let mut next = prev.timestamp + interval;
                while next < bar.timestamp {
                    filled.push(PriceBar::flat(next, close));
                    next += interval;
                }
            }
            filled.push(bar);
        }
        Self { bars: filled }
    }
}
