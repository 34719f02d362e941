//! Evaluations (historical trigger events) and their derived extremum paths.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bar::PriceSeries;

/// One recorded extreme of the price path, as a fractional change from the
/// entry price (0.05 = +5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extremum {
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    pub datetime: DateTime<FixedOffset>,
}

/// Chronological extremes of one event, ending with the close-out entry.
pub type ExtremumPath = Vec<Extremum>;

/// A historical trigger: a news mention of `symbol` at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub timestamp: DateTime<FixedOffset>,
    pub symbol: String,
    #[serde(default)]
    pub exchange: Option<String>,
    /// Classification score in [-10, 10], when the event source provides one.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub score: Option<Decimal>,
    #[serde(default)]
    pub label: Option<String>,
    pub url: String,
}

/// An evaluation paired with the extremum path derived from its price data.
///
/// Only built for events whose data was retrieved and whose path is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub evaluation: Evaluation,
    pub path: ExtremumPath,
    /// Raw bars kept for later rendering.
    pub series: Option<PriceSeries>,
}

impl EvaluationResult {
    pub fn new(evaluation: Evaluation, path: ExtremumPath) -> Self {
        Self {
            evaluation,
            path,
            series: None,
        }
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series = Some(series);
        self
    }

    pub fn score(&self) -> Option<Decimal> {
        self.evaluation.score
    }

    pub fn url(&self) -> &str {
        &self.evaluation.url
    }
}
