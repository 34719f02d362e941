//! Batch pipeline: collect extremum paths for an event batch, fit one
//! bracket per score bucket, and measure a fitted table on new events.

use std::path::PathBuf;

use log::{debug, info, warn};
use ratiolab_core::{
    bucket_index_for_score, build_ratio_table, extract_extrema, save_ratio_table,
    split_into_buckets, BestRatio, Evaluation, EvaluationResult, HistoricalDataSource, PersistError,
    RatioCandidate, RatioError, RatioSearch, RatioTable, ScoreRange,
};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::{ConfigError, RunConfig};
use crate::events::{load_events, EventBatch, EventError};
use crate::loader::{load_event, WindowOptions};
use crate::sources::{CsvMinuteCache, SyntheticSource};
use crate::summary::RunSummary;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("events error: {0}")]
    Events(#[from] EventError),

    #[error("kernel error: {0}")]
    Kernel(#[from] RatioError),

    #[error("ratio table error: {0}")]
    Persist(#[from] PersistError),

    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An event that produced no result, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub url: String,
    pub symbol: String,
    pub reason: String,
}

/// Results collected for a batch.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub results: Vec<EvaluationResult>,
    pub skipped: Vec<SkipRecord>,
    /// Some result was built from synthetic bars.
    pub has_synthetic: bool,
}

fn skip(evaluation: &Evaluation, reason: impl Into<String>) -> SkipRecord {
    SkipRecord {
        url: evaluation.url.clone(),
        symbol: evaluation.symbol.clone(),
        reason: reason.into(),
    }
}

/// Build an extremum path for every event that has data.
///
/// Events whose bars cannot be loaded, whose window is empty or whose entry
/// price is too low are skipped and recorded, never fatal.
pub fn collect_results(
    events: &[Evaluation],
    config: &RunConfig,
    source: &dyn HistoricalDataSource,
    fallback: Option<&dyn HistoricalDataSource>,
) -> Collected {
    let options = WindowOptions {
        time_limit: config.time_limit(),
        warm_up: config.warm_up(),
        min_entry_price: config.min_entry_price,
    };

    let mut collected = Collected::default();
    for (i, evaluation) in events.iter().enumerate() {
        debug!(
            "[{}/{}] {} {}",
            i + 1,
            events.len(),
            evaluation.symbol,
            evaluation.timestamp
        );
        let loaded = match load_event(evaluation, &options, source, fallback) {
            Ok(loaded) => loaded,
            Err(e) => {
                info!("Skipping {} ({}): {e}", evaluation.url, evaluation.symbol);
                collected.skipped.push(skip(evaluation, e.to_string()));
                continue;
            }
        };

        let path = match extract_extrema(loaded.window.bars(), loaded.entry_index, config.precision)
        {
            Ok(path) if path.is_empty() => {
                collected.skipped.push(skip(evaluation, "no data"));
                continue;
            }
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping {}: {e}", evaluation.url);
                collected.skipped.push(skip(evaluation, e.to_string()));
                continue;
            }
        };

        collected.has_synthetic |= loaded.synthetic;
        collected
            .results
            .push(EvaluationResult::new(evaluation.clone(), path).with_series(loaded.window));
    }
    collected
}

/// Output of [`optimize`].
#[derive(Debug, Clone)]
pub struct OptimizeReport {
    pub table: RatioTable,
    pub summary: RunSummary,
    pub skipped: Vec<SkipRecord>,
    pub bad_urls: Vec<String>,
}

/// Load the configured events and bars, fit the ratio table, and write the
/// table (and summary, when configured).
pub fn optimize(config: &RunConfig) -> Result<OptimizeReport, RunError> {
    config.validate()?;
    let batch = load_events(&config.events_path)?;
    info!(
        "Loaded {} events ({} malformed, {} in session, {} duplicates)",
        batch.events.len(),
        batch.bad_urls.len(),
        batch.in_session,
        batch.duplicates
    );
    let cache = CsvMinuteCache::new(&config.cache_dir);
    let synthetic = SyntheticSource;
    let fallback: Option<&dyn HistoricalDataSource> = if config.synthetic_fallback {
        Some(&synthetic)
    } else {
        None
    };
    optimize_batch(batch, config, &cache, fallback)
}

/// [`optimize`] over an already parsed batch and explicit sources.
pub fn optimize_batch(
    batch: EventBatch,
    config: &RunConfig,
    source: &dyn HistoricalDataSource,
    fallback: Option<&dyn HistoricalDataSource>,
) -> Result<OptimizeReport, RunError> {
    let search = RatioSearch::new(config.search_grid()).with_parallelism(config.parallel);
    let Collected {
        results,
        mut skipped,
        has_synthetic,
    } = collect_results(&batch.events, config, source, fallback);
    info!(
        "Collected {} results, skipped {}",
        results.len(),
        skipped.len()
    );

    let best = search.find_best(&results)?;
    if let Some(best) = &best {
        info!("Overall best: {}", describe(best));
    }
    let summary = RunSummary::new(&results, best, has_synthetic)?;
    if let Some(path) = &config.summary_path {
        summary.write_json(path)?;
        info!("Wrote summary to {}", path.display());
    }

    let (scored, unscored): (Vec<_>, Vec<_>) =
        results.into_iter().partition(|r| r.score().is_some());
    for result in &unscored {
        warn!("No score for {}; left out of buckets", result.url());
        skipped.push(skip(&result.evaluation, "missing score"));
    }

    let buckets = split_into_buckets(scored, config.bucket_width)?;
    for bucket in buckets.iter().filter(|b| !b.is_empty()) {
        info!(
            "Bucket [{}, {}]: {} events",
            bucket.range.low,
            bucket.range.high,
            bucket.len()
        );
    }
    let table = build_ratio_table(&buckets, &search)?;
    for group in &table {
        info!(
            "[{}, {}] target {} stop {} average {}",
            group.score_range.low,
            group.score_range.high,
            group.target_profit(),
            group.stop_loss(),
            group.average
        );
    }

    save_ratio_table(&config.ratios_path, &table)?;
    info!(
        "Wrote {} groups to {}",
        table.len(),
        config.ratios_path.display()
    );

    Ok(OptimizeReport {
        table,
        summary,
        skipped,
        bad_urls: batch.bad_urls,
    })
}

fn describe(best: &BestRatio) -> String {
    format!(
        "target {} stop {} average {}",
        best.candidate.target_profit(),
        best.candidate.stop_loss(),
        best.average
    )
}

/// Live performance of one fitted group on a new batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMeasurement {
    pub score_range: ScoreRange,
    pub candidate: RatioCandidate,
    /// Average on the events the group was fitted on.
    pub fitted_average: Decimal,
    /// Average on the new events, `None` when none mapped to the group.
    pub live_average: Option<Decimal>,
    pub count: usize,
}

/// Output of [`measure`].
#[derive(Debug, Clone)]
pub struct MeasureReport {
    pub groups: Vec<GroupMeasurement>,
    /// Events whose score is missing or maps to no group.
    pub unmatched: Vec<String>,
    pub skipped: Vec<SkipRecord>,
}

/// Load the configured events and bars and measure `table` on them.
pub fn measure(config: &RunConfig, table: &RatioTable) -> Result<MeasureReport, RunError> {
    config.validate()?;
    let batch = load_events(&config.events_path)?;
    let cache = CsvMinuteCache::new(&config.cache_dir);
    let synthetic = SyntheticSource;
    let fallback: Option<&dyn HistoricalDataSource> = if config.synthetic_fallback {
        Some(&synthetic)
    } else {
        None
    };
    measure_batch(&batch.events, config, table, &cache, fallback)
}

/// [`measure`] over parsed events and explicit sources.
///
/// Each event is routed to its group with [`bucket_index_for_score`]; every
/// group's bracket is then averaged over the events routed to it.
pub fn measure_batch(
    events: &[Evaluation],
    config: &RunConfig,
    table: &RatioTable,
    source: &dyn HistoricalDataSource,
    fallback: Option<&dyn HistoricalDataSource>,
) -> Result<MeasureReport, RunError> {
    let search = RatioSearch::new(config.search_grid()).with_parallelism(config.parallel);
    let collected = collect_results(events, config, source, fallback);

    let mut routed: Vec<Vec<EvaluationResult>> = vec![Vec::new(); table.len()];
    let mut unmatched = Vec::new();
    for result in collected.results {
        let Some(score) = result.score() else {
            warn!("No score for {}; not measured", result.url());
            unmatched.push(result.evaluation.url);
            continue;
        };
        match bucket_index_for_score(table, score) {
            Ok(index) => routed[index].push(result),
            Err(RatioError::LookupMiss { score }) => {
                warn!("No group for score {score}: {}", result.url());
                unmatched.push(result.evaluation.url);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut groups = Vec::with_capacity(table.len());
    for (group, results) in table.iter().zip(&routed) {
        let live_average = search.average_for(results, &group.candidate)?;
        groups.push(GroupMeasurement {
            score_range: group.score_range,
            candidate: group.candidate,
            fitted_average: group.average,
            live_average,
            count: results.len(),
        });
    }

    Ok(MeasureReport {
        groups,
        unmatched,
        skipped: collected.skipped,
    })
}
