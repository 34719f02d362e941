//! Domain types shared by every stage of the kernel.

pub mod bar;
pub mod event;
pub mod ratio;

pub use bar::{PriceBar, PriceSeries, SeriesError};
pub use event::{Evaluation, EvaluationResult, Extremum, ExtremumPath};
pub use ratio::{Direction, GroupRatio, RatioCandidate, RatioTable, ScoreRange};
