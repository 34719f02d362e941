//! First-touch bracket evaluation over an extremum path.
//!
//! A bracket rests a profit target and a stop at the same time; whichever
//! level the path touches first (in time, not by magnitude) decides the
//! fill, capped exactly at the order level. Within a single entry the target
//! is checked before the stop.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Direction, Extremum, RatioCandidate};
use crate::error::RatioError;

/// Which leg of the bracket closed the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    Target,
    Stop,
    /// Neither level touched; closed at the last path value.
    CloseOut,
}

/// Realized return of one bracket on one path, signed as profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    pub datetime: DateTime<FixedOffset>,
    pub exit: ExitReason,
}

/// Evaluate `candidate` against `path`.
///
/// For a long bracket the outcome is `target_profit`, `stop_loss` or the
/// last value. A short bracket returns the negation of those, so a short
/// that reaches its target of -0.035 realizes +0.035.
pub fn evaluate(candidate: &RatioCandidate, path: &[Extremum]) -> Result<Outcome, RatioError> {
    let last = path.last().ok_or(RatioError::EmptyPath { index: 0 })?;
    let target = candidate.target_profit();
    let stop = candidate.stop_loss();
    let direction = candidate.direction();

    let hit = path.iter().find_map(|e| {
        let (target_hit, stop_hit) = match direction {
            Direction::Long => (e.value >= target, e.value <= stop),
            Direction::Short => (e.value <= target, e.value >= stop),
        };
        if target_hit {
            Some((target, e.datetime, ExitReason::Target))
        } else if stop_hit {
            Some((stop, e.datetime, ExitReason::Stop))
        } else {
            None
        }
    });
    let (level, datetime, exit) = hit.unwrap_or((last.value, last.datetime, ExitReason::CloseOut));

    let value = match direction {
        Direction::Long => level,
        Direction::Short => -level,
    };
    Ok(Outcome {
        value,
        datetime,
        exit,
    })
}

/// Validate `(target_profit, stop_loss)` as a bracket, then evaluate it.
pub fn evaluate_pair(
    target_profit: Decimal,
    stop_loss: Decimal,
    path: &[Extremum],
) -> Result<Outcome, RatioError> {
    let candidate = RatioCandidate::new(target_profit, stop_loss)?;
    evaluate(&candidate, path)
}
