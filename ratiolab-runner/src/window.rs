//! Event window cutting: the slice of a symbol's minute bars that one event
//! trades over.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone};
use ratiolab_core::{PriceBar, PriceSeries};

/// Cut the bars an event anchored at `anchor` trades over.
///
/// The window starts at the anchor or, when the anchor's day has no bars
/// at or before it, at the first bar after the start of that day (a later
/// trading day when the anchor's own day is empty). When the anchor falls
/// strictly between two bars, a flat bar carrying the previous close is
/// placed at the anchor.
///
/// The window then runs for `time_limit` of trading time, inclusive. Time
/// advances by the gap between consecutive bars of the same day and by one
/// minute across a day boundary, so a window opened late in the session
/// continues into the next session.
///
/// Returns `None` when no bar exists at or after the start of the anchor's
/// day, or the anchor lies after the last bar.
pub fn cut_event_window(
    series: &PriceSeries,
    anchor: DateTime<FixedOffset>,
    time_limit: Duration,
) -> Option<PriceSeries> {
    let bars = series.bars();
    let day_start = start_of_day(anchor)?;
    let first = bars.iter().position(|b| b.timestamp >= day_start)?;

    let mut window: Vec<PriceBar> = Vec::new();
    let rest = if bars[first].timestamp >= anchor {
        &bars[first..]
    } else {
        let after = bars[first..].iter().position(|b| b.timestamp >= anchor)? + first;
        if bars[after].timestamp > anchor {
            window.push(PriceBar::flat(anchor, bars[after - 1].close));
        }
        &bars[after..]
    };

    let mut elapsed = Duration::zero();
    let mut prev = window.last().map(|b| b.timestamp);
    for bar in rest {
        if let Some(prev) = prev {
            elapsed += if prev.date_naive() == bar.timestamp.date_naive() {
                bar.timestamp - prev
            } else {
                Duration::minutes(1)
            };
        }
        if elapsed > time_limit {
            break;
        }
        window.push(bar.clone());
        prev = Some(bar.timestamp);
    }

    PriceSeries::new(window).ok()
}

fn start_of_day(t: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let midnight = t.date_naive().and_time(NaiveTime::MIN);
    t.offset().from_local_datetime(&midnight).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 7, day, hour, minute, 0)
            .unwrap()
    }

    fn session(day: u32, from: (u32, u32), minutes: u32, base: Decimal) -> Vec<PriceBar> {
        (0..minutes)
            .map(|i| {
                let total = from.0 * 60 + from.1 + i;
                PriceBar::flat(at(day, total / 60, total % 60), base + Decimal::from(i))
            })
            .collect()
    }

    fn series(parts: Vec<Vec<PriceBar>>) -> PriceSeries {
        PriceSeries::new(parts.into_iter().flatten().collect()).unwrap()
    }

    #[test]
    fn midnight_anchor_starts_at_open() {
        let s = series(vec![session(1, (9, 30), 60, dec!(10))]);
        let w = cut_event_window(&s, at(1, 0, 0), Duration::minutes(10)).unwrap();
        assert_eq!(w.len(), 11);
        assert_eq!(w.first().unwrap().timestamp, at(1, 9, 30));
        assert_eq!(w.last().unwrap().timestamp, at(1, 9, 40));
    }

    #[test]
    fn empty_anchor_day_rolls_to_next_session() {
        let s = series(vec![session(2, (9, 30), 30, dec!(10))]);
        let w = cut_event_window(&s, at(1, 0, 0), Duration::minutes(5)).unwrap();
        assert_eq!(w.first().unwrap().timestamp, at(2, 9, 30));
        assert_eq!(w.len(), 6);
    }

    #[test]
    fn anchor_between_bars_gets_flat_bar() {
        let mut bars = session(1, (9, 30), 10, dec!(10));
        bars.extend(session(1, (9, 45), 10, dec!(20)));
        let s = series(vec![bars]);

        let w = cut_event_window(&s, at(1, 9, 42), Duration::minutes(5)).unwrap();
        let first = w.first().unwrap();
        assert_eq!(first.timestamp, at(1, 9, 42));
        assert_eq!(first.close, dec!(19));
        assert_eq!(first.volume, 0);
        // 9:42 synthetic, then 9:45 .. 9:47.
        assert_eq!(w.len(), 4);
        assert_eq!(w.last().unwrap().timestamp, at(1, 9, 47));
    }

    #[test]
    fn anchor_on_a_bar_is_not_duplicated() {
        let s = series(vec![session(1, (9, 30), 20, dec!(10))]);
        let w = cut_event_window(&s, at(1, 9, 35), Duration::minutes(2)).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.first().unwrap().close, dec!(15));
    }

    #[test]
    fn late_window_continues_into_next_session() {
        let s = series(vec![
            session(1, (15, 55), 5, dec!(10)),
            session(2, (9, 30), 30, dec!(50)),
        ]);
        let w = cut_event_window(&s, at(1, 15, 55), Duration::minutes(10)).unwrap();
        // 15:55..15:59 is 4 minutes, the day change 1 more, then 9:30..9:35.
        assert_eq!(w.len(), 11);
        assert_eq!(w.last().unwrap().timestamp, at(2, 9, 35));
    }

    #[test]
    fn anchor_after_last_bar_is_none() {
        let s = series(vec![session(1, (9, 30), 10, dec!(10))]);
        assert!(cut_event_window(&s, at(1, 12, 0), Duration::minutes(5)).is_none());
        assert!(cut_event_window(&s, at(3, 0, 0), Duration::minutes(5)).is_none());
        assert!(cut_event_window(&PriceSeries::default(), at(1, 0, 0), Duration::minutes(5)).is_none());
    }
}
