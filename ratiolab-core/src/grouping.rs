//! Score buckets: fixed-width partitions of the [-10, 10] classification
//! score, each searched independently for its own bracket.

use rust_decimal::Decimal;

use crate::domain::{EvaluationResult, GroupRatio, RatioTable, ScoreRange};
use crate::error::RatioError;
use crate::search::RatioSearch;

pub const SCORE_MIN: Decimal = Decimal::from_parts(10, 0, 0, true, 0);
pub const SCORE_MAX: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Results whose score falls in `range`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBucket {
    pub range: ScoreRange,
    pub results: Vec<EvaluationResult>,
}

impl ScoreBucket {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Partition `results` into `[low, low + width)` buckets from -10 upward.
///
/// The last bucket also takes +10. Empty buckets are kept so a bucket's
/// index always maps to the same score range.
pub fn split_into_buckets(
    results: Vec<EvaluationResult>,
    width: Decimal,
) -> Result<Vec<ScoreBucket>, RatioError> {
    let span = SCORE_MAX - SCORE_MIN;
    if width <= Decimal::ZERO || !(span % width).is_zero() {
        return Err(RatioError::InvalidBucketWidth { width });
    }
    let count = bucket_count(span / width, width)?;

    let mut buckets: Vec<ScoreBucket> = (0..count)
        .map(|i| {
            let low = SCORE_MIN + width * Decimal::from(i);
            ScoreBucket {
                range: ScoreRange::new(low, low + width),
                results: Vec::new(),
            }
        })
        .collect();

    for result in results {
        let score = result.score().ok_or_else(|| RatioError::MissingScore {
            url: result.url().to_string(),
        })?;
        if score < SCORE_MIN || score > SCORE_MAX {
            return Err(RatioError::ScoreOutOfRange { score });
        }
        let last = count - 1;
        let index = usize::try_from(((score - SCORE_MIN) / width).floor())
            .map_or(last, |i| i.min(last));
        buckets[index].results.push(result);
    }

    Ok(buckets)
}

fn bucket_count(ratio: Decimal, width: Decimal) -> Result<usize, RatioError> {
    usize::try_from(ratio)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(RatioError::InvalidBucketWidth { width })
}

/// Search every non-empty bucket and collect the winners into a table.
///
/// Buckets with no candidate are left out. Each group records the URLs of
/// the events it was fitted on.
pub fn build_ratio_table(
    buckets: &[ScoreBucket],
    search: &RatioSearch,
) -> Result<RatioTable, RatioError> {
    let mut groups = Vec::new();
    for bucket in buckets.iter().filter(|b| !b.is_empty()) {
        let Some(best) = search.find_best(&bucket.results)? else {
            continue;
        };
        groups.push(GroupRatio {
            score_range: bucket.range,
            candidate: best.candidate,
            average: best.average,
            urls: bucket.results.iter().map(|r| r.url().to_string()).collect(),
        });
    }
    Ok(RatioTable::new(groups))
}

/// First group whose range contains `score`, edges included.
pub fn bucket_for_score(table: &RatioTable, score: Decimal) -> Result<&GroupRatio, RatioError> {
    let index = bucket_index_for_score(table, score)?;
    Ok(&table.groups()[index])
}

/// Position in `table` of the group [`bucket_for_score`] returns.
pub fn bucket_index_for_score(table: &RatioTable, score: Decimal) -> Result<usize, RatioError> {
    table
        .iter()
        .position(|g| g.score_range.contains(score))
        .ok_or(RatioError::LookupMiss { score })
}
