//! Run summary: date span, trade frequency, winning bracket, per-event
//! ranking and a batch fingerprint.

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate};
use ratiolab_core::{
    evaluate, quantize, BestRatio, EvaluationResult, ExitReason, RatioCandidate, RatioError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pipeline::RunError;

/// Current schema version for persisted summaries.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// One event's realized outcome under the chosen bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEvent {
    pub url: String,
    pub symbol: String,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(with = "rust_decimal::serde::str")]
    pub outcome: Decimal,
    pub exit: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub event_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Events per calendar day, `count / (days + 1)`.
    #[serde(with = "rust_decimal::serde::str")]
    pub avg_trades_per_day: Decimal,
    pub best: Option<BestRatio>,
    /// BLAKE3 over URLs and extremum paths, in URL order.
    pub fingerprint: String,
    /// Some bars came from the synthetic source.
    pub has_synthetic: bool,
    /// Events ranked by outcome under `best`, highest first.
    pub ranking: Vec<RankedEvent>,
}

impl RunSummary {
    pub fn new(
        results: &[EvaluationResult],
        best: Option<BestRatio>,
        has_synthetic: bool,
    ) -> Result<Self, RatioError> {
        let dates = results.iter().map(|r| r.evaluation.timestamp.date_naive());
        let start_date = dates.clone().min();
        let end_date = dates.max();

        let avg_trades_per_day = match (start_date, end_date) {
            (Some(start), Some(end)) => {
                let days = Decimal::from((end - start).num_days() + 1);
                quantize(Decimal::from(results.len()) / days, 2)
            }
            _ => Decimal::ZERO,
        };

        let ranking = match &best {
            Some(best) => rank_results(results, &best.candidate)?,
            None => Vec::new(),
        };

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            event_count: results.len(),
            start_date,
            end_date,
            avg_trades_per_day,
            best,
            fingerprint: batch_fingerprint(results),
            has_synthetic,
            ranking,
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<(), RunError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RunError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Evaluate `candidate` on every result and sort by outcome, highest first.
/// Equal outcomes keep their input order.
pub fn rank_results(
    results: &[EvaluationResult],
    candidate: &RatioCandidate,
) -> Result<Vec<RankedEvent>, RatioError> {
    let mut ranked = results
        .iter()
        .enumerate()
        .map(|(index, r)| {
            let outcome = evaluate(candidate, &r.path).map_err(|e| match e {
                RatioError::EmptyPath { .. } => RatioError::EmptyPath { index },
                other => other,
            })?;
            Ok(RankedEvent {
                url: r.evaluation.url.clone(),
                symbol: r.evaluation.symbol.clone(),
                timestamp: r.evaluation.timestamp,
                outcome: outcome.value,
                exit: outcome.exit,
            })
        })
        .collect::<Result<Vec<_>, RatioError>>()?;
    ranked.sort_by(|a, b| b.outcome.cmp(&a.outcome));
    Ok(ranked)
}

/// Deterministic BLAKE3 hash of a batch, independent of result order.
pub fn batch_fingerprint(results: &[EvaluationResult]) -> String {
    let mut ordered: Vec<&EvaluationResult> = results.iter().collect();
    ordered.sort_by(|a, b| a.url().cmp(b.url()));

    let mut hasher = blake3::Hasher::new();
    for result in ordered {
        hasher.update(result.url().as_bytes());
        for e in &result.path {
            hasher.update(e.value.normalize().to_string().as_bytes());
            hasher.update(e.datetime.to_rfc3339().as_bytes());
        }
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
