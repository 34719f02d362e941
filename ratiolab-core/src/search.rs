//! Grid search over (target_profit, stop_loss) brackets.
//!
//! The grid is roughly a thousand targets by up to a hundred stops, scored
//! against every path in the batch, so the search never builds candidate
//! objects in the hot loop. Paths are converted once to integer ticks at the
//! grid precision and normalized so a short bracket reads like a long one.
//! For every (target, path) pair the first target touch and the lowest value
//! before it are computed once; each stop then resolves in constant time.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{EvaluationResult, RatioCandidate};
use crate::error::RatioError;
use crate::evaluator::evaluate;
use crate::numeric::{
    from_ticks, quantize, to_ticks, NumericError, DEFAULT_PRECISION, MAX_PRECISION,
};

/// Shape of the candidate grid.
///
/// Targets are every multiple of `step` in `[target_min, target_max]`,
/// excluding zero and anything with `|t| < dead_zone`. For each target the
/// stop magnitudes run `step, 2·step, …` up to `max_stop_loss` (or up to
/// `|t|` as well when `cap_stop_at_target` is set), signed opposite to the
/// target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchGrid {
    pub step: Decimal,
    pub target_min: Decimal,
    pub target_max: Decimal,
    pub dead_zone: Decimal,
    pub max_stop_loss: Decimal,
    pub cap_stop_at_target: bool,
    pub precision: u32,
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            step: Decimal::new(1, 3),
            target_min: Decimal::new(-5, 1),
            target_max: Decimal::new(5, 1),
            dead_zone: Decimal::new(2, 3),
            max_stop_loss: Decimal::new(1, 1),
            cap_stop_at_target: false,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl SearchGrid {
    /// Check the grid is well formed and that every bound sits on the
    /// precision's tick lattice.
    pub fn validate(&self) -> Result<(), RatioError> {
        self.ticks().map(|_| ())
    }

    /// Target values in ascending order.
    pub fn targets(&self) -> Result<Vec<Decimal>, RatioError> {
        let ticks = self.ticks()?;
        Ok(ticks
            .targets
            .iter()
            .map(|t| from_ticks(*t, self.precision))
            .collect())
    }

    /// Number of (target, stop) pairs the grid enumerates.
    pub fn size(&self) -> Result<usize, RatioError> {
        let ticks = self.ticks()?;
        Ok(ticks
            .targets
            .iter()
            .map(|t| ticks.stop_count(*t) as usize)
            .sum())
    }

    fn ticks(&self) -> Result<GridTicks, RatioError> {
        if self.precision > MAX_PRECISION {
            return Err(RatioError::InvalidGrid(format!(
                "precision {} exceeds {MAX_PRECISION}",
                self.precision
            )));
        }
        if self.step <= Decimal::ZERO {
            return Err(RatioError::InvalidGrid(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if self.target_min > self.target_max {
            return Err(RatioError::InvalidGrid(format!(
                "target_min {} is above target_max {}",
                self.target_min, self.target_max
            )));
        }
        if self.dead_zone < Decimal::ZERO {
            return Err(RatioError::InvalidGrid(format!(
                "dead_zone must not be negative, got {}",
                self.dead_zone
            )));
        }
        if self.max_stop_loss <= Decimal::ZERO {
            return Err(RatioError::InvalidGrid(format!(
                "max_stop_loss must be positive, got {}",
                self.max_stop_loss
            )));
        }

        let on_lattice = |name: &str, value: Decimal| {
            to_ticks(value, self.precision).ok_or_else(|| {
                RatioError::InvalidGrid(format!(
                    "{name} {value} is not representable at precision {}",
                    self.precision
                ))
            })
        };
        let step = on_lattice("step", self.step)?;
        let min = on_lattice("target_min", self.target_min)?;
        let max = on_lattice("target_max", self.target_max)?;
        let max_stop = on_lattice("max_stop_loss", self.max_stop_loss)?;

        let first = min.div_euclid(step) + i64::from(min.rem_euclid(step) != 0);
        let last = max.div_euclid(step);
        let targets: Vec<i64> = (first..=last)
            .map(|k| k * step)
            .filter(|t| *t != 0 && from_ticks(t.abs(), self.precision) >= self.dead_zone)
            .collect();
        if targets.is_empty() {
            return Err(RatioError::InvalidGrid(
                "grid contains no targets outside the dead zone".to_string(),
            ));
        }

        Ok(GridTicks {
            step,
            max_stop,
            cap_stop_at_target: self.cap_stop_at_target,
            targets,
        })
    }
}

/// The grid converted to integer ticks.
struct GridTicks {
    step: i64,
    max_stop: i64,
    cap_stop_at_target: bool,
    targets: Vec<i64>,
}

impl GridTicks {
    /// Stop magnitudes for `target` are `k * step` for `k` in `1..=stop_count`.
    fn stop_count(&self, target: i64) -> i64 {
        let ceiling = if self.cap_stop_at_target {
            self.max_stop.min(target.abs())
        } else {
            self.max_stop
        };
        ceiling / self.step
    }
}

/// Winning bracket of a search and its average realized outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestRatio {
    pub candidate: RatioCandidate,
    #[serde(with = "rust_decimal::serde::str")]
    pub average: Decimal,
}

/// Best stop found for one target, as a sum over the batch.
#[derive(Debug, Clone, Copy)]
struct TargetBest {
    target: i64,
    stop: i64,
    sum: i128,
}

/// Ratio search over a fixed grid.
#[derive(Debug, Clone)]
pub struct RatioSearch {
    grid: SearchGrid,
    parallel: bool,
}

impl RatioSearch {
    pub fn new(grid: SearchGrid) -> Self {
        Self {
            grid,
            parallel: true,
        }
    }

    /// Enables or disables parallel evaluation across targets.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn grid(&self) -> &SearchGrid {
        &self.grid
    }

    /// Find the bracket with the strictly greatest average outcome over
    /// `results`.
    ///
    /// Candidates are visited target ascending, then stop ascending; the
    /// first of several equal averages wins. An empty batch returns
    /// `Ok(None)`. Results are checked for empty paths and for values off
    /// the grid precision before any searching starts.
    pub fn find_best(&self, results: &[EvaluationResult]) -> Result<Option<BestRatio>, RatioError> {
        let grid = self.grid.ticks()?;
        if results.is_empty() {
            return Ok(None);
        }
        let precision = self.grid.precision;
        let paths = tick_paths(results, precision)?;

        let per_target: Vec<Option<TargetBest>> = if self.parallel {
            grid.targets
                .par_iter()
                .map(|&t| best_for_target(&grid, &paths, t))
                .collect()
        } else {
            grid.targets
                .iter()
                .map(|&t| best_for_target(&grid, &paths, t))
                .collect()
        };

        // Sequential reduce keeps the first-seen tie-break independent of
        // how rayon scheduled the targets.
        let mut best: Option<TargetBest> = None;
        for candidate in per_target.into_iter().flatten() {
            if best.map_or(true, |b| candidate.sum > b.sum) {
                best = Some(candidate);
            }
        }

        let Some(best) = best else {
            return Ok(None);
        };
        let candidate = RatioCandidate::new(
            from_ticks(best.target, precision),
            from_ticks(best.stop, precision),
        )?;
        let average = average_of_sum(best.sum, results.len(), precision)?;
        Ok(Some(BestRatio { candidate, average }))
    }

    /// Average outcome of one fixed bracket over `results`, quantized to the
    /// grid precision. An empty batch returns `Ok(None)`.
    pub fn average_for(
        &self,
        results: &[EvaluationResult],
        candidate: &RatioCandidate,
    ) -> Result<Option<Decimal>, RatioError> {
        average_with_precision(results, candidate, self.grid.precision)
    }
}

/// Search the grid for the best bracket over `results`.
pub fn find_best_ratio(
    results: &[EvaluationResult],
    grid: &SearchGrid,
) -> Result<Option<BestRatio>, RatioError> {
    RatioSearch::new(grid.clone()).find_best(results)
}

/// Average outcome of `(target_profit, stop_loss)` over `results` at the
/// default precision. The pair is validated first.
pub fn average_for_ratio(
    results: &[EvaluationResult],
    target_profit: Decimal,
    stop_loss: Decimal,
) -> Result<Option<Decimal>, RatioError> {
    let candidate = RatioCandidate::new(target_profit, stop_loss)?;
    average_with_precision(results, &candidate, DEFAULT_PRECISION)
}

fn average_with_precision(
    results: &[EvaluationResult],
    candidate: &RatioCandidate,
    precision: u32,
) -> Result<Option<Decimal>, RatioError> {
    if results.is_empty() {
        return Ok(None);
    }
    let mut sum = Decimal::ZERO;
    for (index, result) in results.iter().enumerate() {
        let outcome = evaluate(candidate, &result.path).map_err(|e| match e {
            RatioError::EmptyPath { .. } => RatioError::EmptyPath { index },
            other => other,
        })?;
        sum = sum
            .checked_add(outcome.value)
            .ok_or(NumericError::Overflow)?;
    }
    let count = Decimal::from(results.len());
    Ok(Some(quantize(sum / count, precision)))
}

fn average_of_sum(sum: i128, count: usize, precision: u32) -> Result<Decimal, RatioError> {
    let total = Decimal::try_from_i128_with_scale(sum, precision)
        .map_err(|_| NumericError::Overflow)?;
    Ok(quantize(total / Decimal::from(count), precision))
}

/// Convert every path to ticks, rejecting empty paths and off-lattice values.
fn tick_paths(results: &[EvaluationResult], precision: u32) -> Result<Vec<Vec<i64>>, RatioError> {
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            if result.path.is_empty() {
                return Err(RatioError::EmptyPath { index });
            }
            result
                .path
                .iter()
                .map(|e| {
                    to_ticks(e.value, precision).ok_or(RatioError::PrecisionMismatch {
                        value: e.value,
                        precision,
                    })
                })
                .collect()
        })
        .collect()
}

/// Where a normalized path stands against one target.
#[derive(Debug, Clone, Copy)]
struct Touch {
    /// Lowest value strictly before the first target touch, or over the
    /// whole path when the target is never reached.
    low_before: i64,
    target_hit: bool,
    last: i64,
}

fn touch(path: &[i64], sign: i64, target: i64) -> Touch {
    let mut low_before = i64::MAX;
    for &v in path {
        let w = v * sign;
        if w >= target {
            return Touch {
                low_before,
                target_hit: true,
                last: 0,
            };
        }
        low_before = low_before.min(w);
    }
    Touch {
        low_before,
        target_hit: false,
        last: path.last().map_or(0, |v| v * sign),
    }
}

/// Best stop for `target` (raw ticks, either sign) over all paths.
fn best_for_target(grid: &GridTicks, paths: &[Vec<i64>], target: i64) -> Option<TargetBest> {
    let sign = target.signum();
    let normalized_target = target * sign;
    let touches: Vec<Touch> = paths
        .iter()
        .map(|p| touch(p, sign, normalized_target))
        .collect();

    let count = grid.stop_count(target);
    if count == 0 {
        return None;
    }
    let score = |magnitude: i64| -> i128 {
        touches
            .iter()
            .map(|t| {
                let outcome = if t.low_before <= -magnitude {
                    -magnitude
                } else if t.target_hit {
                    normalized_target
                } else {
                    t.last
                };
                i128::from(outcome)
            })
            .sum()
    };

    let mut best: Option<(i64, i128)> = None;
    for k in 1..=count {
        // Stops ascend numerically: a long's stops are negative, so its
        // magnitudes are visited largest first.
        let k = if sign > 0 { count + 1 - k } else { k };
        let magnitude = k * grid.step;
        let sum = score(magnitude);
        if best.map_or(true, |(_, s)| sum > s) {
            best = Some((magnitude, sum));
        }
    }

    best.map(|(magnitude, sum)| TargetBest {
        target,
        stop: -magnitude * sign,
        sum,
    })
}
