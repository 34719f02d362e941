//! Event-file parsing and session anchoring.
//!
//! The event file is a JSON array of news records:
//!
//! ```json
//! [{"date": "2024-03-04 07:12:00", "ticker": "ACME", "exchange": "NYSE",
//!   "url": "https://…", "score": 6.5, "label": "positive"}]
//! ```
//!
//! Dates are US/Eastern wall-clock times. A record published before the
//! 09:30 open is anchored to midnight of its own day; one published at or
//! after the 16:00 close is anchored to midnight of the next day. Records
//! published during the session are skipped. Each record is parsed on its
//! own, so one malformed entry never sinks the batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::America::New_York;
use log::{debug, warn};
use ratiolab_core::grouping::{SCORE_MAX, SCORE_MIN};
use ratiolab_core::Evaluation;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("read events {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("events file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("events file must hold a JSON array")]
    NotAnArray,
}

/// Why a single record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("missing or non-string field '{0}'")]
    MissingField(&'static str),

    #[error("unparseable date '{0}'")]
    BadDate(String),

    #[error("date '{0}' does not exist in US/Eastern")]
    NonexistentLocalTime(String),

    #[error("unparseable score '{0}'")]
    BadScore(String),

    #[error("score {0} outside [-10, 10]")]
    ScoreOutOfRange(Decimal),
}

/// Parsed events plus what was dropped along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    pub events: Vec<Evaluation>,
    /// URLs (or record positions when the URL is missing) of malformed records.
    pub bad_urls: Vec<String>,
    /// Records published while the market was open.
    pub in_session: usize,
    /// Records for a symbol already anchored to the same day.
    pub duplicates: usize,
}

/// Read and parse an event file.
pub fn load_events(path: &Path) -> Result<EventBatch, EventError> {
    let content = std::fs::read_to_string(path).map_err(|source| EventError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_events(&content)
}

/// Parse the JSON text of an event file.
pub fn parse_events(content: &str) -> Result<EventBatch, EventError> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(records) = value else {
        return Err(EventError::NotAnArray);
    };

    let mut batch = EventBatch::default();
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let evaluation = match parse_record(record) {
            Ok(Some(evaluation)) => evaluation,
            Ok(None) => {
                batch.in_session += 1;
                continue;
            }
            Err(e) => {
                let url = record
                    .get("url")
                    .and_then(Value::as_str)
                    .map_or_else(|| format!("record #{index}"), str::to_string);
                warn!("Skipping event {url}: {e}");
                batch.bad_urls.push(url);
                continue;
            }
        };

        let key = (
            evaluation.symbol.clone(),
            evaluation.timestamp.date_naive(),
        );
        if !seen.insert(key) {
            debug!(
                "Duplicate event for {} on {}: {}",
                evaluation.symbol,
                evaluation.timestamp.date_naive(),
                evaluation.url
            );
            batch.duplicates += 1;
            continue;
        }
        batch.events.push(evaluation);
    }

    if !batch.bad_urls.is_empty() {
        warn!("{} malformed event records", batch.bad_urls.len());
    }
    Ok(batch)
}

/// Parse one record. `Ok(None)` means it was published during the session.
fn parse_record(record: &Value) -> Result<Option<Evaluation>, RecordError> {
    let date = str_field(record, "date")?;
    let symbol = str_field(record, "ticker")?;
    let url = str_field(record, "url")?;

    let published = NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| RecordError::BadDate(date.to_string()))?;
    let Some(anchor) = session_anchor(published)? else {
        return Ok(None);
    };

    let score = match record.get("score") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_score(value)?),
    };

    Ok(Some(Evaluation {
        timestamp: anchor,
        symbol: symbol.to_string(),
        exchange: optional_str(record, "exchange"),
        score,
        label: optional_str(record, "label"),
        url: url.to_string(),
    }))
}

/// Map an Eastern wall-clock publication time to the midnight the event is
/// traded from, or `None` when it falls inside 09:30..16:00.
pub fn session_anchor(
    published: NaiveDateTime,
) -> Result<Option<DateTime<FixedOffset>>, RecordError> {
    let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN);
    let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN);

    // Reject wall-clock times skipped by a DST transition.
    New_York
        .from_local_datetime(&published)
        .earliest()
        .ok_or_else(|| RecordError::NonexistentLocalTime(published.to_string()))?;

    let day = published.date();
    let anchor_day = if published.time() < open {
        day
    } else if published.time() >= close {
        match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return Err(RecordError::BadDate(published.to_string())),
        }
    } else {
        return Ok(None);
    };

    let midnight = anchor_day.and_time(NaiveTime::MIN);
    New_York
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| Some(dt.fixed_offset()))
        .ok_or_else(|| RecordError::NonexistentLocalTime(midnight.to_string()))
}

fn str_field<'a>(record: &'a Value, name: &'static str) -> Result<&'a str, RecordError> {
    record
        .get(name)
        .and_then(Value::as_str)
        .ok_or(RecordError::MissingField(name))
}

fn optional_str(record: &Value, name: &str) -> Option<String> {
    record.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Scores arrive as JSON numbers or numeric strings.
fn parse_score(value: &Value) -> Result<Decimal, RecordError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(RecordError::BadScore(other.to_string())),
    };
    let score = text
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| RecordError::BadScore(text.clone()))?;
    if score < SCORE_MIN || score > SCORE_MAX {
        return Err(RecordError::ScoreOutOfRange(score));
    }
    Ok(score)
}
