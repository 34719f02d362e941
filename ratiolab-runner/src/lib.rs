//! RatioLab Runner — event batches, per-bucket ratio fitting, live
//! measurement and run summaries.
//!
//! This crate builds on `ratiolab-core` to provide:
//! - TOML run configuration with environment overrides
//! - Event-file parsing with session anchoring and de-duplication
//! - Minute-bar loading from a CSV cache, with a tagged synthetic fallback
//! - Event window cutting, warm-up offset and minimum entry price filter
//! - The optimize and measure pipelines
//! - Run summaries with outcome ranking and a batch fingerprint

pub mod config;
pub mod events;
pub mod loader;
pub mod pipeline;
pub mod sources;
pub mod summary;
pub mod window;

pub use config::{ConfigError, RunConfig};
pub use events::{load_events, parse_events, EventBatch, EventError};
pub use loader::{load_event, LoadError, LoadedEvent, WindowOptions};
pub use pipeline::{
    collect_results, measure, measure_batch, optimize, optimize_batch, Collected,
    GroupMeasurement, MeasureReport, OptimizeReport, RunError, SkipRecord,
};
pub use sources::{CsvMinuteCache, SyntheticSource};
pub use summary::{rank_results, RankedEvent, RunSummary};
pub use window::cut_event_window;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<WindowOptions>();
        assert_sync::<WindowOptions>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<OptimizeReport>();
        assert_sync::<OptimizeReport>();
        assert_send::<MeasureReport>();
        assert_sync::<MeasureReport>();
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
    }

    #[test]
    fn sources_are_send_sync() {
        assert_send::<CsvMinuteCache>();
        assert_sync::<CsvMinuteCache>();
        assert_send::<SyntheticSource>();
        assert_sync::<SyntheticSource>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }
}
