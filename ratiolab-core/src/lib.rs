//! RatioLab Core — the bracket-ratio kernel.
//!
//! This crate is pure and synchronous:
//! - Fixed-precision decimal helpers and the `FixedPoint` sentinel type
//! - Domain types (bars, evaluations, extremum paths, brackets, ratio tables)
//! - Extremum extraction from minute bars
//! - First-touch bracket evaluation
//! - Grid search for the best (target, stop) pair
//! - Score bucketing and ratio-table lookup
//! - Ratio-table persistence
//! - Collaborator traits for data sources and execution venues
//!
//! Nothing here logs or does network I/O. Every public type is safe to share
//! across threads against immutable inputs.

pub mod domain;
pub mod error;
pub mod evaluator;
pub mod extremum;
pub mod grouping;
pub mod numeric;
pub mod persistence;
pub mod search;
pub mod source;
pub mod venue;

pub use domain::{
    Direction, Evaluation, EvaluationResult, Extremum, ExtremumPath, GroupRatio, PriceBar,
    PriceSeries, RatioCandidate, RatioTable, ScoreRange, SeriesError,
};
pub use error::RatioError;
pub use evaluator::{evaluate, evaluate_pair, ExitReason, Outcome};
pub use extremum::{entry_index_after, extract_extrema};
pub use grouping::{
    bucket_for_score, bucket_index_for_score, build_ratio_table, split_into_buckets, ScoreBucket,
};
pub use numeric::{
    quantize, round_to_step, truncate, FixedPoint, NumericError, DEFAULT_PRECISION,
};
pub use persistence::{load_ratio_table, save_ratio_table, PersistError};
pub use search::{average_for_ratio, find_best_ratio, BestRatio, RatioSearch, SearchGrid};
pub use source::{DataError, HistoricalDataSource};
pub use venue::{BracketOrder, ExecutionVenue, FillConfirmation, VenueError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn domain_types_are_send_sync() {
        assert_send::<PriceBar>();
        assert_sync::<PriceBar>();
        assert_send::<PriceSeries>();
        assert_sync::<PriceSeries>();
        assert_send::<EvaluationResult>();
        assert_sync::<EvaluationResult>();
        assert_send::<RatioTable>();
        assert_sync::<RatioTable>();
    }

    #[test]
    fn search_types_are_send_sync() {
        assert_send::<RatioSearch>();
        assert_sync::<RatioSearch>();
        assert_send::<SearchGrid>();
        assert_sync::<SearchGrid>();
        assert_send::<BestRatio>();
        assert_sync::<BestRatio>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<RatioError>();
        assert_sync::<RatioError>();
        assert_send::<PersistError>();
        assert_sync::<PersistError>();
        assert_send::<DataError>();
        assert_sync::<DataError>();
    }

    /// Collaborators are shared between worker threads as trait objects.
    #[test]
    fn collaborator_trait_objects_are_send_sync() {
        assert_send::<Box<dyn HistoricalDataSource>>();
        assert_sync::<Box<dyn HistoricalDataSource>>();
        assert_send::<Box<dyn ExecutionVenue>>();
        assert_sync::<Box<dyn ExecutionVenue>>();
    }
}
