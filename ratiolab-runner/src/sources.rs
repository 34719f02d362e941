//! Minute-bar sources: an on-disk CSV cache and a deterministic synthetic
//! generator.
//!
//! Cache layout: `{cache_dir}/{SYMBOL}.csv` with header
//! `timestamp,open,high,low,close,volume` and RFC 3339 timestamps.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use ratiolab_core::{DataError, HistoricalDataSource, PriceBar, PriceSeries};
use rust_decimal::Decimal;

/// Minutes in a regular 09:30–16:00 session.
const SESSION_MINUTES: i64 = 390;

/// Reads minute bars from per-symbol CSV files.
pub struct CsvMinuteCache {
    cache_dir: PathBuf,
}

impl CsvMinuteCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("{symbol}.csv"))
    }

    /// Write a series to the cache, replacing any existing file.
    ///
    /// Writes are atomic: write to .tmp then rename.
    pub fn write(&self, symbol: &str, series: &PriceSeries) -> Result<(), DataError> {
        if series.is_empty() {
            return Err(DataError::CacheError("no bars to cache".into()));
        }
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let path = self.symbol_path(symbol);
        let tmp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)
                .map_err(|e| DataError::CacheError(format!("open {}: {e}", tmp_path.display())))?;
            for bar in series.bars() {
                writer
                    .serialize(bar)
                    .map_err(|e| DataError::CacheError(format!("csv write: {e}")))?;
            }
            writer
                .flush()
                .map_err(|e| DataError::CacheError(format!("csv flush: {e}")))?;
        }

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })
    }

    fn read_bars(&self, symbol: &str) -> Result<Vec<PriceBar>, DataError> {
        let path = self.symbol_path(symbol);
        if !path.exists() {
            return Err(DataError::NotAvailable {
                symbol: symbol.to_string(),
            });
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::CacheError(format!("open {}: {e}", path.display())))?;
        reader
            .deserialize::<PriceBar>()
            .enumerate()
            .map(|(row, bar)| {
                bar.map_err(|e| {
                    DataError::CacheError(format!("{} row {}: {e}", path.display(), row + 1))
                })
            })
            .collect()
    }
}

impl HistoricalDataSource for CsvMinuteCache {
    fn name(&self) -> &str {
        "csv-cache"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<PriceSeries, DataError> {
        let mut bars: Vec<PriceBar> = self
            .read_bars(symbol)?
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();

        if let Some(bad) = bars.iter().find(|b| !b.is_sane()) {
            return Err(DataError::ValidationError(format!(
                "{symbol}: insane bar at {}",
                bad.timestamp
            )));
        }
        if bars.is_empty() {
            return Err(DataError::NotAvailable {
                symbol: symbol.to_string(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        fill_within_sessions(bars)
    }
}

/// Gap-fill each calendar day on its own so overnight gaps stay open.
pub fn fill_within_sessions(bars: Vec<PriceBar>) -> Result<PriceSeries, DataError> {
    let mut days: BTreeMap<NaiveDate, Vec<PriceBar>> = BTreeMap::new();
    for bar in bars {
        days.entry(bar.timestamp.date_naive()).or_default().push(bar);
    }

    let mut filled = Vec::new();
    for (_, day) in days {
        let series =
            PriceSeries::new(day).map_err(|e| DataError::ValidationError(e.to_string()))?;
        filled.extend(series.fill_minute_gaps().into_bars());
    }
    PriceSeries::new(filled).map_err(|e| DataError::ValidationError(e.to_string()))
}

/// Deterministic random-walk minute bars for any symbol.
///
/// The walk is seeded from the symbol and the requested start date, so the
/// same request always yields the same bars. Weekdays only, 09:30–16:00 in
/// the offset of `start`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticSource;

impl HistoricalDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<PriceSeries, DataError> {
        let bars = generate_minute_bars(symbol, start, end);
        if bars.is_empty() {
            return Err(DataError::NotAvailable {
                symbol: symbol.to_string(),
            });
        }
        PriceSeries::new(bars).map_err(|e| DataError::Other(e.to_string()))
    }
}

fn generate_minute_bars(
    symbol: &str,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<PriceBar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed_bytes = blake3::hash(format!("{symbol}|{}", start.date_naive()).as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

    let offset = *start.offset();
    let open_time = NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN);
    // Prices are walked in cents.
    let mut cents: i64 = rng.gen_range(1_000..20_000);
    let mut bars = Vec::new();
    let mut day = start.date_naive();

    while day <= end.date_naive() {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day += Duration::days(1);
            continue;
        }
        let Some(session_open) = offset.from_local_datetime(&day.and_time(open_time)).single()
        else {
            day += Duration::days(1);
            continue;
        };
        for minute in 0..SESSION_MINUTES {
            let timestamp = session_open + Duration::minutes(minute);
            let open = cents;
            let close = (open + rng.gen_range(-8..=8)).max(1);
            let high = open.max(close) + rng.gen_range(0..=4);
            let low = (open.min(close) - rng.gen_range(0..=4)).max(1);
            cents = close;
            if timestamp < start || timestamp > end {
                continue;
            }
            bars.push(PriceBar {
                timestamp,
                open: Decimal::new(open, 2),
                high: Decimal::new(high, 2),
                low: Decimal::new(low, 2),
                close: Decimal::new(close, 2),
                volume: rng.gen_range(100..10_000u64),
            });
        }
        day += Duration::days(1);
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 7, day, hour, minute, 0)
            .unwrap()
    }

    fn bar(t: DateTime<FixedOffset>, close: Decimal) -> PriceBar {
        PriceBar {
            timestamp: t,
            open: close,
            high: close + dec!(0.05),
            low: close - dec!(0.05),
            close,
            volume: 500,
        }
    }

    #[test]
    fn cache_roundtrip_with_gap_fill() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvMinuteCache::new(dir.path());
        let series = PriceSeries::new(vec![
            bar(at(1, 9, 30), dec!(10.00)),
            bar(at(1, 9, 33), dec!(10.20)),
            bar(at(2, 9, 30), dec!(11.00)),
        ])
        .unwrap();
        cache.write("ACME", &series).unwrap();
        assert!(dir.path().join("ACME.csv").exists());
        assert!(!dir.path().join("ACME.csv.tmp").exists());

        let loaded = cache.fetch("ACME", at(1, 0, 0), at(3, 0, 0)).unwrap();
        // 9:31 and 9:32 filled; the overnight gap stays open.
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.bars()[1], PriceBar::flat(at(1, 9, 31), dec!(10.00)));
        assert_eq!(loaded.bars()[3].close, dec!(10.20));
        assert_eq!(loaded.last().unwrap().timestamp, at(2, 9, 30));
    }

    #[test]
    fn fetch_filters_to_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvMinuteCache::new(dir.path());
        let series = PriceSeries::new(vec![
            bar(at(1, 9, 30), dec!(10)),
            bar(at(2, 9, 30), dec!(11)),
        ])
        .unwrap();
        cache.write("ACME", &series).unwrap();

        let loaded = cache.fetch("ACME", at(2, 0, 0), at(2, 23, 0)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(matches!(
            cache.fetch("ACME", at(5, 0, 0), at(6, 0, 0)),
            Err(DataError::NotAvailable { .. })
        ));
    }

    #[test]
    fn missing_symbol_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvMinuteCache::new(dir.path());
        assert!(matches!(
            cache.fetch("NONE", at(1, 0, 0), at(2, 0, 0)),
            Err(DataError::NotAvailable { .. })
        ));
    }

    #[test]
    fn insane_bar_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-07-01T09:30:00-04:00,10,9,11,10,100\n",
        )
        .unwrap();
        let cache = CsvMinuteCache::new(dir.path());
        assert!(matches!(
            cache.fetch("BAD", at(1, 0, 0), at(2, 0, 0)),
            Err(DataError::ValidationError(_))
        ));
    }

    #[test]
    fn corrupt_row_is_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "timestamp,open,high,low,close,volume\nnot-a-date,1,1,1,1,1\n",
        )
        .unwrap();
        let cache = CsvMinuteCache::new(dir.path());
        assert!(matches!(
            cache.fetch("BAD", at(1, 0, 0), at(2, 0, 0)),
            Err(DataError::CacheError(_))
        ));
    }

    #[test]
    fn synthetic_is_deterministic_and_sane() {
        let source = SyntheticSource;
        // 2024-07-01 is a Monday.
        let a = source.fetch("ACME", at(1, 0, 0), at(2, 23, 59)).unwrap();
        let b = source.fetch("ACME", at(1, 0, 0), at(2, 23, 59)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2 * SESSION_MINUTES as usize);
        assert_eq!(a.first().unwrap().timestamp, at(1, 9, 30));
        assert!(a.bars().iter().all(PriceBar::is_sane));

        let other = source.fetch("BOLT", at(1, 0, 0), at(2, 23, 59)).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn synthetic_skips_weekends() {
        // 2024-07-06/07 is a weekend.
        let result = SyntheticSource.fetch("ACME", at(6, 0, 0), at(7, 23, 59));
        assert!(matches!(result, Err(DataError::NotAvailable { .. })));
    }
}
