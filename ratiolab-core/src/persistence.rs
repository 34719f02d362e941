//! Ratio table file format.
//!
//! A JSON array with one object per group:
//!
//! ```json
//! [{"score_range": [-0.5, 0.0], "target_profit": "-0.035", "stop_loss": "0.008",
//!   "average": "0.035", "urls": ["https://..."]}]
//! ```
//!
//! Score edges are plain JSON numbers and are re-quantized to four digits on
//! load. Bracket values and averages are decimal strings so they round-trip
//! exactly. Writes are atomic: write `<path>.tmp`, then rename into place.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{GroupRatio, RatioCandidate, RatioTable, ScoreRange};
use crate::error::RatioError;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed ratio table: {0}")]
    Format(#[from] serde_json::Error),

    #[error("group #{index} is not a valid bracket: {source}")]
    InvalidGroup {
        index: usize,
        #[source]
        source: RatioError,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    #[serde(with = "score_range")]
    score_range: ScoreRange,
    #[serde(with = "rust_decimal::serde::str")]
    target_profit: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    average: Decimal,
    #[serde(default)]
    urls: Vec<String>,
}

impl From<&GroupRatio> for GroupRecord {
    fn from(group: &GroupRatio) -> Self {
        Self {
            score_range: group.score_range,
            target_profit: group.target_profit(),
            stop_loss: group.stop_loss(),
            average: group.average,
            urls: group.urls.clone(),
        }
    }
}

mod score_range {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::domain::ScoreRange;
    use crate::numeric::FixedPoint;

    const PRECISION: u32 = 4;

    pub fn serialize<S: Serializer>(range: &ScoreRange, serializer: S) -> Result<S::Ok, S::Error> {
        let edge = |x: Decimal| {
            x.to_f64()
                .ok_or_else(|| S::Error::custom(format!("score edge {x} is not representable")))
        };
        [edge(range.low)?, edge(range.high)?].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScoreRange, D::Error> {
        let [low, high] = <[f64; 2]>::deserialize(deserializer)?;
        let edge = |x: f64| -> Result<Decimal, D::Error> {
            FixedPoint::from_f64(x, PRECISION)
                .map_err(D::Error::custom)?
                .finite()
                .map(|d| d.normalize())
                .ok_or_else(|| D::Error::custom("score edge must be finite"))
        };
        Ok(ScoreRange::new(edge(low)?, edge(high)?))
    }
}

impl RatioTable {
    /// Serialize as a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String, PersistError> {
        let records: Vec<GroupRecord> = self.iter().map(GroupRecord::from).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Parse a table, re-validating every bracket.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let records: Vec<GroupRecord> = serde_json::from_str(json)?;
        let groups = records
            .into_iter()
            .enumerate()
            .map(|(index, r)| {
                let candidate = RatioCandidate::new(r.target_profit, r.stop_loss)
                    .map_err(|source| PersistError::InvalidGroup { index, source })?;
                Ok(GroupRatio {
                    score_range: r.score_range,
                    candidate,
                    average: r.average,
                    urls: r.urls,
                })
            })
            .collect::<Result<Vec<_>, PersistError>>()?;
        Ok(RatioTable::new(groups))
    }
}

/// Write `table` to `path` atomically, creating parent directories.
pub fn save_ratio_table(path: &Path, table: &RatioTable) -> Result<(), PersistError> {
    let json = table.to_json()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp_path = tmp_path(path);
    fs::write(&tmp_path, json).map_err(io_error(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Read a table written by [`save_ratio_table`].
pub fn load_ratio_table(path: &Path) -> Result<RatioTable, PersistError> {
    let json = fs::read_to_string(path).map_err(io_error(path))?;
    RatioTable::from_json(&json)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PersistError {
    let path = path.to_path_buf();
    move |source| PersistError::Io { path, source }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
