//! RatioLab CLI — fit, measure and look up news-event brackets.
//!
//! Commands:
//! - `optimize` — fit one (target, stop) bracket per score bucket and write the ratio table
//! - `measure` — replay a ratio table on the configured events and report live averages
//! - `lookup` — print the bracket that applies to a score, optionally priced for an entry

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ratiolab_core::numeric::{display_precision, format_fixed};
use ratiolab_core::{bucket_for_score, load_ratio_table, BracketOrder, RatioError};
use ratiolab_runner::{measure, optimize, RunConfig};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "ratiolab",
    about = "RatioLab CLI — bracket ratio fitting for news-driven trades"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a ratio table from the events and bars named in a TOML config.
    Optimize {
        /// Path to a TOML run config.
        #[arg(long, default_value = "ratiolab.toml")]
        config: PathBuf,
    },
    /// Measure a fitted ratio table on the configured events.
    Measure {
        /// Path to a TOML run config.
        #[arg(long, default_value = "ratiolab.toml")]
        config: PathBuf,

        /// Ratio table to measure. Defaults to the config's `ratios_path`.
        #[arg(long)]
        ratios: Option<PathBuf>,
    },
    /// Print the bracket for a score.
    Lookup {
        /// Ratio table file.
        #[arg(long)]
        ratios: PathBuf,

        /// Classification score in [-10, 10].
        #[arg(long, allow_hyphen_values = true)]
        score: Decimal,

        /// Symbol for the priced order (required with --entry-price).
        #[arg(long)]
        symbol: Option<String>,

        /// Entry price; when given, target and stop prices are printed too.
        #[arg(long)]
        entry_price: Option<Decimal>,

        /// Price tick the order levels are snapped to.
        #[arg(long, default_value = "0.01")]
        tick: Decimal,

        /// Order quantity.
        #[arg(long, default_value_t = 100)]
        quantity: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize { config } => run_optimize(&config),
        Commands::Measure { config, ratios } => run_measure(&config, ratios),
        Commands::Lookup {
            ratios,
            score,
            symbol,
            entry_price,
            tick,
            quantity,
        } => run_lookup(&ratios, score, symbol, entry_price, tick, quantity),
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let config = RunConfig::from_file(path)
        .with_context(|| format!("loading config {}", path.display()))?
        .with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run_optimize(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let report = optimize(&config)?;

    println!(
        "{:>16}  {:>9}  {:>9}  {:>9}  {:>6}",
        "score range", "target", "stop", "average", "events"
    );
    for group in &report.table {
        println!(
            "{:>16}  {:>9}  {:>9}  {:>9}  {:>6}",
            format!("[{}, {}]", group.score_range.low, group.score_range.high),
            group.target_profit(),
            group.stop_loss(),
            group.average,
            group.urls.len()
        );
    }
    println!();

    let summary = &report.summary;
    if let Some(best) = &summary.best {
        println!(
            "Overall best: target {} stop {} average {}",
            best.candidate.target_profit(),
            best.candidate.stop_loss(),
            best.average
        );
    }
    if let (Some(start), Some(end)) = (summary.start_date, summary.end_date) {
        println!(
            "{} events from {start} to {end} ({} per day)",
            summary.event_count, summary.avg_trades_per_day
        );
    }
    println!("Fingerprint: {}", summary.fingerprint);
    if summary.has_synthetic {
        println!("WARNING: results include synthetic data");
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} events", report.skipped.len());
    }
    if !report.bad_urls.is_empty() {
        println!("Bad urls: {}", report.bad_urls.join(", "));
    }
    println!("Ratio table written to {}", config.ratios_path.display());
    Ok(())
}

fn run_measure(config_path: &Path, ratios: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let ratios_path = ratios.unwrap_or_else(|| config.ratios_path.clone());
    let table = load_ratio_table(&ratios_path)
        .with_context(|| format!("loading ratio table {}", ratios_path.display()))?;
    if table.is_empty() {
        bail!("ratio table {} has no groups", ratios_path.display());
    }

    let report = measure(&config, &table)?;
    println!(
        "{:>16}  {:>9}  {:>9}  {:>9}  {:>9}  {:>6}",
        "score range", "target", "stop", "fitted", "live", "events"
    );
    for group in &report.groups {
        let live = group
            .live_average
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        println!(
            "{:>16}  {:>9}  {:>9}  {:>9}  {:>9}  {:>6}",
            format!("[{}, {}]", group.score_range.low, group.score_range.high),
            group.candidate.target_profit(),
            group.candidate.stop_loss(),
            group.fitted_average,
            live,
            group.count
        );
    }
    if !report.unmatched.is_empty() {
        println!("{} events matched no group", report.unmatched.len());
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} events", report.skipped.len());
    }
    Ok(())
}

fn run_lookup(
    ratios: &Path,
    score: Decimal,
    symbol: Option<String>,
    entry_price: Option<Decimal>,
    tick: Decimal,
    quantity: u64,
) -> Result<()> {
    let table = load_ratio_table(ratios)
        .with_context(|| format!("loading ratio table {}", ratios.display()))?;
    let group = match bucket_for_score(&table, score) {
        Ok(group) => group,
        Err(RatioError::LookupMiss { score }) => {
            bail!("no group in {} covers score {score}", ratios.display())
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Score {score} → [{}, {}]: target {} stop {} (average {})",
        group.score_range.low,
        group.score_range.high,
        group.target_profit(),
        group.stop_loss(),
        group.average
    );

    if let Some(entry_price) = entry_price {
        let Some(symbol) = symbol else {
            bail!("--symbol is required with --entry-price");
        };
        let order = BracketOrder::from_ratio(symbol, entry_price, &group.candidate, quantity, tick)?;
        let digits = display_precision(&[order.entry_price, order.target_price, order.stop_price]);
        println!(
            "{:?} {} x{} @ {}: target {} stop {}",
            order.direction,
            order.symbol,
            order.quantity,
            format_fixed(order.entry_price, digits),
            format_fixed(order.target_price, digits),
            format_fixed(order.stop_price, digits)
        );
    }
    Ok(())
}
