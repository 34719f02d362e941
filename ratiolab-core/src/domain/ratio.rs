//! Bracket candidates and the per-bucket ratio table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RatioError;

/// Directional bias of a bracket, implied by the sign of its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. Multiplying a short path by this sign turns
    /// it into the equivalent long problem.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

/// A validated (target_profit, stop_loss) pair.
///
/// Both values are fractional changes from the entry price. A long bracket
/// has `target_profit > 0` and `stop_loss <= 0`; a short bracket mirrors
/// that. The only constructor is [`RatioCandidate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RatioCandidate {
    #[serde(with = "rust_decimal::serde::str")]
    target_profit: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    stop_loss: Decimal,
}

impl RatioCandidate {
    pub fn new(target_profit: Decimal, stop_loss: Decimal) -> Result<Self, RatioError> {
        if target_profit.is_zero() {
            return Err(RatioError::ZeroTarget);
        }
        let same_side = if target_profit > Decimal::ZERO {
            stop_loss > Decimal::ZERO
        } else {
            stop_loss < Decimal::ZERO
        };
        if same_side {
            return Err(RatioError::SameSideStop {
                target: target_profit,
                stop: stop_loss,
            });
        }
        Ok(Self {
            target_profit,
            stop_loss,
        })
    }

    pub fn target_profit(&self) -> Decimal {
        self.target_profit
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    pub fn direction(&self) -> Direction {
        if self.target_profit > Decimal::ZERO {
            Direction::Long
        } else {
            Direction::Short
        }
    }
}

impl<'de> Deserialize<'de> for RatioCandidate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(with = "rust_decimal::serde::str")]
            target_profit: Decimal,
            #[serde(with = "rust_decimal::serde::str")]
            stop_loss: Decimal,
        }
        let raw = Raw::deserialize(deserializer)?;
        RatioCandidate::new(raw.target_profit, raw.stop_loss).map_err(serde::de::Error::custom)
    }
}

/// Score interval a group applies to.
///
/// Built half-open (`[low, high)`, the last bucket closed at +10) but matched
/// inclusively on both ends at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreRange {
    pub low: Decimal,
    pub high: Decimal,
}

impl ScoreRange {
    pub fn new(low: Decimal, high: Decimal) -> Self {
        Self { low, high }
    }

    /// Inclusive containment used by lookups.
    pub fn contains(&self, score: Decimal) -> bool {
        self.low <= score && score <= self.high
    }
}

/// The best bracket found for one score bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRatio {
    pub score_range: ScoreRange,
    pub candidate: RatioCandidate,
    /// Average realized outcome of `candidate` over the bucket's events.
    pub average: Decimal,
    /// Identifiers of the events that contributed.
    pub urls: Vec<String>,
}

impl GroupRatio {
    pub fn target_profit(&self) -> Decimal {
        self.candidate.target_profit()
    }

    pub fn stop_loss(&self) -> Decimal {
        self.candidate.stop_loss()
    }
}

/// All group ratios of one optimisation run, persisted as a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatioTable {
    groups: Vec<GroupRatio>,
}

impl RatioTable {
    pub fn new(groups: Vec<GroupRatio>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[GroupRatio] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<GroupRatio> {
        self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GroupRatio> {
        self.groups.iter()
    }
}

impl<'a> IntoIterator for &'a RatioTable {
    type Item = &'a GroupRatio;
    type IntoIter = std::slice::Iter<'a, GroupRatio>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
