//! Extremum extraction: compress a bar series into the chronological list of
//! new highs and lows relative to the entry close.
//!
//! The walk works on raw prices and only converts to fractional changes at
//! the end. Each bar runs the low branch and then the high branch; a branch
//! either extends the current leg in place or opens a new one. The last bar's
//! close is always appended as the close-out entry, so a non-empty series
//! never yields an empty path.

use chrono::{DateTime, Duration, FixedOffset};
use rust_decimal::Decimal;

use crate::domain::{Extremum, ExtremumPath, PriceBar};
use crate::error::RatioError;
use crate::numeric::{truncate, NumericError};

struct RawEntry {
    price: Decimal,
    datetime: DateTime<FixedOffset>,
}

/// Build the extremum path of `bars`, using `bars[start_index].close` as the
/// entry price.
///
/// An empty slice returns an empty path, which callers treat as "no data".
/// Values are truncated toward zero at `precision` fractional digits, so a
/// price that stops short of a grid threshold never reads as a touch.
pub fn extract_extrema(
    bars: &[PriceBar],
    start_index: usize,
    precision: u32,
) -> Result<ExtremumPath, RatioError> {
    if bars.is_empty() {
        return Ok(Vec::new());
    }
    let reference = bars.get(start_index).ok_or(RatioError::StartIndexOutOfRange {
        index: start_index,
        len: bars.len(),
    })?;
    let entry = reference.close;
    if entry <= Decimal::ZERO {
        return Err(RatioError::NonPositiveEntryPrice { price: entry });
    }

    // Index 0 is the reference sentinel; it is never part of the output.
    let mut raw = vec![RawEntry {
        price: entry,
        datetime: reference.timestamp,
    }];

    for bar in &bars[start_index + 1..] {
        let last = current(&raw, entry);
        if bar.low < entry && bar.low < last {
            push_or_extend(&mut raw, bar.low, bar.timestamp, last < entry);
        }

        let last = current(&raw, entry);
        if bar.high > entry && bar.high > last {
            push_or_extend(&mut raw, bar.high, bar.timestamp, last > entry);
        }
    }

    // start_index is in range, so the slice has a last bar.
    let closing = &bars[bars.len() - 1];
    raw.push(RawEntry {
        price: closing.close,
        datetime: closing.timestamp,
    });

    raw.into_iter()
        .skip(1)
        .map(|e| {
            let ratio = e.price.checked_div(entry).ok_or(NumericError::Overflow)?;
            Ok(Extremum {
                value: truncate(ratio - Decimal::ONE, precision),
                datetime: e.datetime,
            })
        })
        .collect()
}

fn current(raw: &[RawEntry], entry: Decimal) -> Decimal {
    raw.last().map_or(entry, |e| e.price)
}

fn push_or_extend(
    raw: &mut Vec<RawEntry>,
    price: Decimal,
    datetime: DateTime<FixedOffset>,
    extend: bool,
) {
    match raw.last_mut() {
        Some(last) if extend => {
            last.price = price;
            last.datetime = datetime;
        }
        _ => raw.push(RawEntry { price, datetime }),
    }
}

/// Index of the first bar at or after `bars[0].timestamp + warm_up`.
///
/// Used to skip the first minutes of a window before taking the entry
/// price. Returns `None` for an empty slice or a warm-up longer than the
/// series.
pub fn entry_index_after(bars: &[PriceBar], warm_up: Duration) -> Option<usize> {
    let first = bars.first()?;
    let cutoff = first.timestamp + warm_up;
    bars.iter().position(|b| b.timestamp >= cutoff)
}
