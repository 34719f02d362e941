//! Kernel error type.
//!
//! Every variant except `LookupMiss` is an invalid-input error: a caller bug
//! that is surfaced immediately. Routine "nothing to do" situations (an empty
//! extremum path, an empty batch) are ordinary return values, not errors.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::numeric::NumericError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatioError {
    #[error("stop_loss {stop} sits on the same side of the entry as target_profit {target}")]
    SameSideStop { target: Decimal, stop: Decimal },

    #[error("target_profit of zero has no direction")]
    ZeroTarget,

    #[error("score {score} is outside [-10, 10]")]
    ScoreOutOfRange { score: Decimal },

    #[error("evaluation '{url}' has no score and cannot be bucketed")]
    MissingScore { url: String },

    #[error("bucket width {width} must be positive and divide the score range exactly")]
    InvalidBucketWidth { width: Decimal },

    #[error("no ratio group covers score {score}")]
    LookupMiss { score: Decimal },

    #[error("invalid search grid: {0}")]
    InvalidGrid(String),

    #[error("start index {index} is out of range for a series of {len} bars")]
    StartIndexOutOfRange { index: usize, len: usize },

    #[error("entry price {price} must be positive")]
    NonPositiveEntryPrice { price: Decimal },

    #[error("cannot evaluate an empty extremum path (result #{index})")]
    EmptyPath { index: usize },

    #[error("path value {value} is not representable at precision {precision}")]
    PrecisionMismatch { value: Decimal, precision: u32 },

    #[error(transparent)]
    Numeric(#[from] NumericError),
}
