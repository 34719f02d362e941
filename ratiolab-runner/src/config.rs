//! Run configuration, loaded from TOML.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```toml
//! events_path = "data/events.json"
//! cache_dir = "data/minutes"
//! ratios_path = "out/ratios.json"
//! bucket_width = "0.5"
//!
//! [grid]
//! target_min = "-0.3"
//! target_max = "0.3"
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use ratiolab_core::numeric::MAX_PRECISION;
use ratiolab_core::{RatioError, SearchGrid, DEFAULT_PRECISION};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides `ratios_path` when set.
pub const RATIOS_PATH_ENV: &str = "RATIOLAB_RATIOS_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid search grid: {0}")]
    Grid(#[from] RatioError),
}

/// Everything one optimisation or measurement run needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// JSON array of event records.
    pub events_path: PathBuf,

    /// Directory of `{SYMBOL}.csv` minute files.
    pub cache_dir: PathBuf,

    /// Where the ratio table is written (optimize) or read (measure).
    pub ratios_path: PathBuf,

    /// Optional run summary output.
    pub summary_path: Option<PathBuf>,

    /// Length of each event window after its start.
    pub time_limit_minutes: u32,

    /// Minutes skipped at the start of a window before taking the entry price.
    pub warm_up_minutes: u32,

    /// Events whose entry close is below this are dropped.
    pub min_entry_price: Decimal,

    /// Width of each score bucket; must divide 20.
    pub bucket_width: Decimal,

    /// Fractional digits for path values, the grid and averages. Overrides
    /// `grid.precision`.
    pub precision: u32,

    /// Evaluate grid targets on the rayon pool.
    pub parallel: bool,

    /// Generate synthetic bars for symbols with no cached data. Results are
    /// tagged as synthetic.
    pub synthetic_fallback: bool,

    pub grid: SearchGrid,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("data/events.json"),
            cache_dir: PathBuf::from("data/minutes"),
            ratios_path: PathBuf::from("ratios.json"),
            summary_path: None,
            time_limit_minutes: 240,
            warm_up_minutes: 0,
            min_entry_price: Decimal::new(5, 1),
            bucket_width: Decimal::new(5, 1),
            precision: DEFAULT_PRECISION,
            parallel: true,
            synthetic_fallback: false,
            grid: SearchGrid::default(),
        }
    }
}

impl RunConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides (`RATIOLAB_RATIOS_PATH`).
    pub fn with_env_overrides(self) -> Self {
        let ratios = std::env::var_os(RATIOS_PATH_ENV);
        self.with_ratios_override(ratios.map(PathBuf::from))
    }

    fn with_ratios_override(mut self, ratios: Option<PathBuf>) -> Self {
        if let Some(path) = ratios.filter(|p| !p.as_os_str().is_empty()) {
            self.ratios_path = path;
        }
        self
    }

    /// The grid with the run-wide precision applied.
    pub fn search_grid(&self) -> SearchGrid {
        SearchGrid {
            precision: self.precision,
            ..self.grid.clone()
        }
    }

    pub fn time_limit(&self) -> Duration {
        Duration::minutes(i64::from(self.time_limit_minutes))
    }

    pub fn warm_up(&self) -> Duration {
        Duration::minutes(i64::from(self.warm_up_minutes))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_limit_minutes == 0 {
            return Err(ConfigError::Invalid("time_limit_minutes must be positive".into()));
        }
        if self.warm_up_minutes >= self.time_limit_minutes {
            return Err(ConfigError::Invalid(format!(
                "warm_up_minutes ({}) must be shorter than time_limit_minutes ({})",
                self.warm_up_minutes, self.time_limit_minutes
            )));
        }
        if self.min_entry_price < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "min_entry_price must not be negative, got {}",
                self.min_entry_price
            )));
        }
        let span = Decimal::from(20);
        if self.bucket_width <= Decimal::ZERO || !(span % self.bucket_width).is_zero() {
            return Err(ConfigError::Invalid(format!(
                "bucket_width {} must be positive and divide 20",
                self.bucket_width
            )));
        }
        if self.precision > MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "precision {} exceeds {MAX_PRECISION}",
                self.precision
            )));
        }
        self.search_grid().validate()?;
        Ok(())
    }
}
