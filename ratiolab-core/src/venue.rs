//! Execution venue trait and bracket orders derived from a ratio.
//!
//! No broker protocol lives here; a venue is whatever accepts a
//! [`BracketOrder`] and reports a fill.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Direction, RatioCandidate};
use crate::numeric::{round_to_step, NumericError};

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order rejected by venue: {0}")]
    Rejected(String),

    #[error("venue unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Numeric(#[from] NumericError),
}

/// An entry with a resting profit target and stop, both snapped to `tick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketOrder {
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_price: Decimal,
}

impl BracketOrder {
    /// Price the bracket as `entry · (1 + ratio)` for each leg, rounded
    /// toward zero onto the `tick` grid.
    pub fn from_ratio(
        symbol: impl Into<String>,
        entry_price: Decimal,
        candidate: &RatioCandidate,
        quantity: u64,
        tick: Decimal,
    ) -> Result<Self, VenueError> {
        if entry_price <= Decimal::ZERO {
            return Err(VenueError::InvalidOrder(format!(
                "entry price must be positive, got {entry_price}"
            )));
        }
        if quantity == 0 {
            return Err(VenueError::InvalidOrder("quantity must be positive".into()));
        }
        let level = |ratio: Decimal| -> Result<Decimal, VenueError> {
            let raw = entry_price
                .checked_mul(Decimal::ONE + ratio)
                .ok_or(NumericError::Overflow)?;
            Ok(round_to_step(raw, tick)?)
        };
        Ok(Self {
            symbol: symbol.into(),
            direction: candidate.direction(),
            quantity,
            entry_price,
            target_price: level(candidate.target_profit())?,
            stop_price: level(candidate.stop_loss())?,
        })
    }
}

/// What the venue reports back for a submitted bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillConfirmation {
    pub order_id: String,
    pub symbol: String,
    pub quantity: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub fill_price: Decimal,
    pub filled_at: DateTime<FixedOffset>,
}

/// Anything that can take a bracket order.
pub trait ExecutionVenue: Send + Sync {
    fn name(&self) -> &str;

    fn submit_bracket(&self, order: &BracketOrder) -> Result<FillConfirmation, VenueError>;
}
