//! Property tests for kernel invariants.
//!
//! Uses proptest to verify:
//! 1. Capped outcomes — a bracket realizes its target, its stop or the last
//!    path value, never anything else
//! 2. Search agrees with a brute-force scan over the same grid
//! 3. Extraction always ends on the close-out entry
//! 4. Every scored result lands in exactly one bucket that contains it
//! 5. Extraction keeps touch / no-touch of any grid level exactly as the raw
//!    prices have it

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use proptest::prelude::*;
use ratiolab_core::{
    evaluate, extract_extrema, split_into_buckets, Evaluation, EvaluationResult, Extremum,
    PriceBar, RatioCandidate, RatioSearch, SearchGrid,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Helpers ──────────────────────────────────────────────────────────

fn t0() -> DateTime<FixedOffset> {
    FixedOffset::west_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 4, 1, 9, 30, 0)
        .unwrap()
}

fn path_from_ticks(ticks: &[i64]) -> Vec<Extremum> {
    ticks
        .iter()
        .enumerate()
        .map(|(i, t)| Extremum {
            value: Decimal::new(*t, 4),
            datetime: t0() + Duration::minutes(i as i64),
        })
        .collect()
}

fn result(path: Vec<Extremum>, score: Decimal) -> EvaluationResult {
    EvaluationResult::new(
        Evaluation {
            timestamp: t0(),
            symbol: "PROP".into(),
            exchange: None,
            score: Some(score),
            label: None,
            url: format!("https://news.test/{score}"),
        },
        path,
    )
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_path_ticks() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-800i64..800, 1..12)
}

/// Coarse paths (multiples of 0.001) so the small grid sees real ties.
fn arb_coarse_path() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec((-80i64..80).prop_map(|t| t * 10), 1..8)
}

/// A valid bracket as (target_ticks, stop_ticks): opposite signs, stop may be 0.
fn arb_bracket() -> impl Strategy<Value = (i64, i64)> {
    (1i64..600, 0i64..600, any::<bool>()).prop_map(|(t, s, long)| {
        if long {
            (t, -s)
        } else {
            (-t, s)
        }
    })
}

fn small_grid() -> SearchGrid {
    SearchGrid {
        step: dec!(0.01),
        target_min: dec!(-0.05),
        target_max: dec!(0.05),
        dead_zone: dec!(0.02),
        max_stop_loss: dec!(0.03),
        cap_stop_at_target: false,
        precision: 4,
    }
}

/// Visit the grid in its documented order and keep the first strict maximum.
fn brute_force(grid: &SearchGrid, batch: &[EvaluationResult]) -> (RatioCandidate, Decimal) {
    let search = RatioSearch::new(grid.clone()).with_parallelism(false);
    let count = (grid.max_stop_loss / grid.step).trunc();
    let mut best: Option<(RatioCandidate, Decimal)> = None;
    for target in grid.targets().unwrap() {
        let mut k = Decimal::ONE;
        let mut magnitudes = Vec::new();
        while k <= count {
            magnitudes.push(k * grid.step);
            k += Decimal::ONE;
        }
        let stops: Vec<Decimal> = if target > Decimal::ZERO {
            magnitudes.iter().rev().map(|m| -*m).collect()
        } else {
            magnitudes
        };
        for stop in stops {
            let candidate = RatioCandidate::new(target, stop).unwrap();
            let average = search.average_for(batch, &candidate).unwrap().unwrap();
            if best.map_or(true, |(_, b)| average > b) {
                best = Some((candidate, average));
            }
        }
    }
    best.unwrap()
}

// ── 1. Capped outcomes ───────────────────────────────────────────────

proptest! {
    #[test]
    fn outcome_is_target_stop_or_last(ticks in arb_path_ticks(), (t, s) in arb_bracket()) {
        let path = path_from_ticks(&ticks);
        let target = Decimal::new(t, 4);
        let stop = Decimal::new(s, 4);
        let candidate = RatioCandidate::new(target, stop).unwrap();
        let outcome = evaluate(&candidate, &path).unwrap();

        let last = path.last().unwrap().value;
        let allowed = if t > 0 {
            [target, stop, last]
        } else {
            [-target, -stop, -last]
        };
        prop_assert!(allowed.contains(&outcome.value), "{} not in {:?}", outcome.value, allowed);
        prop_assert!(path.iter().any(|e| e.datetime == outcome.datetime));
    }
}

// ── 2. Search vs brute force ─────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn search_matches_brute_force(paths in prop::collection::vec(arb_coarse_path(), 1..5)) {
        let batch: Vec<_> = paths
            .iter()
            .map(|p| result(path_from_ticks(p), dec!(0)))
            .collect();
        let grid = small_grid();
        let found = RatioSearch::new(grid.clone()).find_best(&batch).unwrap().unwrap();
        let (candidate, average) = brute_force(&grid, &batch);
        prop_assert_eq!(found.candidate, candidate);
        prop_assert_eq!(found.average, average);
    }
}

// ── 3. Extraction close-out ──────────────────────────────────────────

proptest! {
    #[test]
    fn extraction_ends_with_close_out(closes in prop::collection::vec(100i64..200, 1..40)) {
        let bars: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let close = Decimal::new(*c, 1);
                PriceBar {
                    timestamp: t0() + Duration::minutes(i as i64),
                    open: close,
                    high: close + dec!(0.2),
                    low: close - dec!(0.2),
                    close,
                    volume: 10,
                }
            })
            .collect();
        let path = extract_extrema(&bars, 0, 4).unwrap();
        prop_assert!(!path.is_empty());

        let entry = bars[0].close;
        let last_bar = bars.last().unwrap();
        let last = path.last().unwrap();
        let expected = ratiolab_core::truncate(last_bar.close / entry - Decimal::ONE, 4);
        prop_assert_eq!(last.value, expected);
        prop_assert_eq!(last.datetime, last_bar.timestamp);
        prop_assert!(path.windows(2).all(|w| w[0].datetime <= w[1].datetime));
    }
}

// ── 4. Bucketing ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn each_score_lands_in_one_containing_bucket(quarters in prop::collection::vec(-40i64..=40, 0..30)) {
        let batch: Vec<_> = quarters
            .iter()
            .map(|q| result(path_from_ticks(&[0]), Decimal::new(*q * 25, 2)))
            .collect();
        let n = batch.len();
        let buckets = split_into_buckets(batch, dec!(0.5)).unwrap();
        prop_assert_eq!(buckets.len(), 40);
        prop_assert_eq!(buckets.iter().map(|b| b.len()).sum::<usize>(), n);
        for bucket in &buckets {
            for r in &bucket.results {
                let s = r.score().unwrap();
                prop_assert!(bucket.range.contains(s));
            }
        }
    }
}

// ── 5. Touch preservation ────────────────────────────────────────────

/// Bars in cents as (close, dip below close, spike above close).
fn arb_cent_bars() -> impl Strategy<Value = Vec<(i64, i64, i64)>> {
    prop::collection::vec((1500i64..2500, 0i64..60, 0i64..60), 1..30)
}

proptest! {
    #[test]
    fn extraction_preserves_grid_touches(
        raw in arb_cent_bars(),
        level_ticks in (-800i64..800).prop_filter("non-zero level", |t| *t != 0),
    ) {
        let bars: Vec<PriceBar> = raw
            .iter()
            .enumerate()
            .map(|(i, (c, dip, spike))| {
                let close = Decimal::new(*c, 2);
                PriceBar {
                    timestamp: t0() + Duration::minutes(i as i64),
                    open: close,
                    high: Decimal::new(c + spike, 2),
                    low: Decimal::new(c - dip, 2),
                    close,
                    volume: 10,
                }
            })
            .collect();
        let entry = bars[0].close;
        let level = Decimal::new(level_ticks, 4);
        let path = extract_extrema(&bars, 0, 4).unwrap();

        let (raw_touch, path_touch) = if level > Decimal::ZERO {
            (
                bars[1..].iter().any(|b| b.high / entry - Decimal::ONE >= level),
                path.iter().any(|e| e.value >= level),
            )
        } else {
            (
                bars[1..].iter().any(|b| b.low / entry - Decimal::ONE <= level),
                path.iter().any(|e| e.value <= level),
            )
        };
        prop_assert_eq!(raw_touch, path_touch);
    }
}
