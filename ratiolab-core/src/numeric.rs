//! Fixed-precision decimal helpers.
//!
//! Every ratio, threshold and path value in the kernel is a `Decimal`
//! quantized to a fixed number of fractional digits (4 by default), so grid
//! comparisons never suffer binary-float drift. `FixedPoint` adds the two
//! infinite sentinels used as "no bound yet" markers; they order correctly
//! against finite values but refuse to take part in arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default number of fractional digits kept by every quantized value.
pub const DEFAULT_PRECISION: u32 = 4;

/// Largest precision `Decimal` can carry.
pub const MAX_PRECISION: u32 = 28;

/// Errors from numeric construction and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("NaN is not a valid fixed-point value")]
    NaN,

    #[error("value {0} is outside the representable decimal range")]
    OutOfRange(String),

    #[error("arithmetic on an infinite fixed-point value")]
    NonFiniteArithmetic,

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("step must be positive, got {0}")]
    NonPositiveStep(Decimal),

    #[error("precision {0} exceeds the maximum of {MAX_PRECISION}")]
    PrecisionTooLarge(u32),

    #[error("cannot parse '{0}' as a fixed-point value")]
    Parse(String),
}

/// Round `x` to `precision` fractional digits, half away from zero.
pub fn quantize(x: Decimal, precision: u32) -> Decimal {
    x.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// Cut `x` to `precision` fractional digits, toward zero.
///
/// A truncated value never crosses a threshold on the same grid that the
/// exact value stays short of.
pub fn truncate(x: Decimal, precision: u32) -> Decimal {
    x.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}

/// Round `x` toward zero onto a multiple of `step`.
///
/// Positive values are floored, negative values are ceiled. Used to snap
/// computed bracket prices onto an instrument's tick grid.
pub fn round_to_step(x: Decimal, step: Decimal) -> Result<Decimal, NumericError> {
    if step <= Decimal::ZERO {
        return Err(NumericError::NonPositiveStep(step));
    }
    let steps = x.checked_div(step).ok_or(NumericError::Overflow)?;
    steps.trunc().checked_mul(step).ok_or(NumericError::Overflow)
}

/// Smallest representable increment at `precision`, e.g. 0.0001 for 4.
pub fn unit(precision: u32) -> Decimal {
    Decimal::new(1, precision)
}

/// Convert a quantized decimal into integer units of `10^-precision`.
///
/// Returns `None` when `x` carries digits beyond `precision` or does not fit
/// in an `i64`.
pub fn to_ticks(x: Decimal, precision: u32) -> Option<i64> {
    if quantize(x, precision) != x {
        return None;
    }
    let mut scaled = x;
    scaled.rescale(precision);
    let mantissa = scaled.mantissa();
    i64::try_from(mantissa).ok()
}

/// Inverse of [`to_ticks`].
pub fn from_ticks(ticks: i64, precision: u32) -> Decimal {
    Decimal::new(ticks, precision)
}

/// Format `x` with exactly `precision` fractional digits.
///
/// Precision is always passed explicitly; there is no process-wide display
/// precision.
pub fn format_fixed(x: Decimal, precision: u32) -> String {
    let mut q = quantize(x, precision);
    q.rescale(precision);
    q.to_string()
}

/// Fractional digits (0–3) needed to render every value in `values` on the
/// coarsest of the 1 / 0.1 / 0.01 / 0.001 tick ladders.
///
/// A price axis that mixes 12.5 and 12.25 needs 2 digits; whole-dollar
/// prices need none. Values finer than 0.001 are shown at 3 digits.
pub fn display_precision<'a, I>(values: I) -> u32
where
    I: IntoIterator<Item = &'a Decimal>,
{
    values
        .into_iter()
        .map(|v| {
            if !(v % Decimal::new(1, 2)).is_zero() {
                3
            } else if !(v % Decimal::new(1, 1)).is_zero() {
                2
            } else if !(v % Decimal::ONE).is_zero() {
                1
            } else {
                0
            }
        })
        .max()
        .unwrap_or(0)
}

/// An exact decimal or one of the two infinite sentinels.
///
/// Ordering is total: `NegInfinity < Finite(_) < PosInfinity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FixedPoint {
    NegInfinity,
    Finite(Decimal),
    PosInfinity,
}

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint::Finite(Decimal::ZERO);

    /// Build from a raw float, quantizing to `precision`.
    ///
    /// `±inf` map to the sentinels; NaN is rejected.
    pub fn from_f64(x: f64, precision: u32) -> Result<Self, NumericError> {
        if precision > MAX_PRECISION {
            return Err(NumericError::PrecisionTooLarge(precision));
        }
        if x.is_nan() {
            return Err(NumericError::NaN);
        }
        if x == f64::INFINITY {
            return Ok(FixedPoint::PosInfinity);
        }
        if x == f64::NEG_INFINITY {
            return Ok(FixedPoint::NegInfinity);
        }
        let d = Decimal::from_f64_retain(x).ok_or_else(|| NumericError::OutOfRange(x.to_string()))?;
        Ok(FixedPoint::Finite(quantize(d, precision)))
    }

    /// Build from an exact decimal, quantizing to `precision`.
    pub fn from_decimal(x: Decimal, precision: u32) -> Self {
        FixedPoint::Finite(quantize(x, precision))
    }

    /// Re-quantize; sentinels pass through unchanged.
    pub fn quantize(self, precision: u32) -> Self {
        match self {
            FixedPoint::Finite(d) => FixedPoint::Finite(quantize(d, precision)),
            other => other,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, FixedPoint::Finite(_))
    }

    /// The finite value, if any.
    pub fn finite(&self) -> Option<Decimal> {
        match self {
            FixedPoint::Finite(d) => Some(*d),
            _ => None,
        }
    }

    fn operands(self, rhs: Self) -> Result<(Decimal, Decimal), NumericError> {
        match (self, rhs) {
            (FixedPoint::Finite(a), FixedPoint::Finite(b)) => Ok((a, b)),
            _ => Err(NumericError::NonFiniteArithmetic),
        }
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, NumericError> {
        let (a, b) = self.operands(rhs)?;
        a.checked_add(b).map(FixedPoint::Finite).ok_or(NumericError::Overflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, NumericError> {
        let (a, b) = self.operands(rhs)?;
        a.checked_sub(b).map(FixedPoint::Finite).ok_or(NumericError::Overflow)
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, NumericError> {
        let (a, b) = self.operands(rhs)?;
        a.checked_mul(b).map(FixedPoint::Finite).ok_or(NumericError::Overflow)
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, NumericError> {
        let (a, b) = self.operands(rhs)?;
        if b.is_zero() {
            return Err(NumericError::DivisionByZero);
        }
        a.checked_div(b).map(FixedPoint::Finite).ok_or(NumericError::Overflow)
    }

    /// Render with exactly `precision` fractional digits (`inf` / `-inf` for sentinels).
    pub fn format(&self, precision: u32) -> String {
        match self {
            FixedPoint::Finite(d) => format_fixed(*d, precision),
            FixedPoint::PosInfinity => "inf".to_string(),
            FixedPoint::NegInfinity => "-inf".to_string(),
        }
    }
}

impl From<Decimal> for FixedPoint {
    fn from(d: Decimal) -> Self {
        FixedPoint::Finite(d)
    }
}

impl PartialEq<Decimal> for FixedPoint {
    fn eq(&self, other: &Decimal) -> bool {
        matches!(self, FixedPoint::Finite(d) if d == other)
    }
}

impl PartialOrd<Decimal> for FixedPoint {
    fn partial_cmp(&self, other: &Decimal) -> Option<Ordering> {
        Some(self.cmp(&FixedPoint::Finite(*other)))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixedPoint::Finite(d) => write!(f, "{d}"),
            FixedPoint::PosInfinity => f.write_str("inf"),
            FixedPoint::NegInfinity => f.write_str("-inf"),
        }
    }
}

impl FromStr for FixedPoint {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inf" | "+inf" | "infinity" | "+infinity" => Ok(FixedPoint::PosInfinity),
            "-inf" | "-infinity" => Ok(FixedPoint::NegInfinity),
            "nan" => Err(NumericError::NaN),
            t => Decimal::from_str(t)
                .map(FixedPoint::Finite)
                .map_err(|_| NumericError::Parse(s.to_string())),
        }
    }
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantize_rounds_half_away_from_zero() {
        assert_eq!(quantize(dec!(0.00005), 4), dec!(0.0001));
        assert_eq!(quantize(dec!(-0.00005), 4), dec!(-0.0001));
        assert_eq!(quantize(dec!(0.00004999), 4), dec!(0.0000));
        assert_eq!(quantize(dec!(1.23456), 4), dec!(1.2346));
    }

    #[test]
    fn truncate_cuts_toward_zero() {
        assert_eq!(truncate(dec!(0.049975), 4), dec!(0.0499));
        assert_eq!(truncate(dec!(-0.029999), 4), dec!(-0.0299));
        assert_eq!(truncate(dec!(0.05), 4), dec!(0.05));
        assert_eq!(truncate(dec!(0.00009), 4), dec!(0));
    }

    #[test]
    fn from_f64_quantizes() {
        let fp = FixedPoint::from_f64(0.1, 4).unwrap();
        assert_eq!(fp, FixedPoint::Finite(dec!(0.1)));
        let fp = FixedPoint::from_f64(-0.035087719298, 4).unwrap();
        assert_eq!(fp, FixedPoint::Finite(dec!(-0.0351)));
    }

    #[test]
    fn from_f64_passes_infinities_and_rejects_nan() {
        assert_eq!(FixedPoint::from_f64(f64::INFINITY, 4).unwrap(), FixedPoint::PosInfinity);
        assert_eq!(FixedPoint::from_f64(f64::NEG_INFINITY, 4).unwrap(), FixedPoint::NegInfinity);
        assert_eq!(FixedPoint::from_f64(f64::NAN, 4), Err(NumericError::NaN));
    }

    #[test]
    fn quantize_passes_sentinels_through() {
        assert_eq!(FixedPoint::PosInfinity.quantize(2), FixedPoint::PosInfinity);
        assert_eq!(FixedPoint::NegInfinity.quantize(2), FixedPoint::NegInfinity);
    }

    #[test]
    fn sentinels_order_around_finite_values() {
        let big = FixedPoint::Finite(dec!(1000000));
        assert!(FixedPoint::NegInfinity < FixedPoint::ZERO);
        assert!(big < FixedPoint::PosInfinity);
        assert!(FixedPoint::NegInfinity < dec!(-1000000));
    }

    #[test]
    fn arithmetic_refuses_sentinels() {
        let one = FixedPoint::Finite(dec!(1));
        assert_eq!(
            one.checked_add(FixedPoint::PosInfinity),
            Err(NumericError::NonFiniteArithmetic)
        );
        assert_eq!(one.checked_div(FixedPoint::ZERO), Err(NumericError::DivisionByZero));
        assert_eq!(
            one.checked_add(FixedPoint::Finite(dec!(0.0002))).unwrap(),
            FixedPoint::Finite(dec!(1.0002))
        );
    }

    #[test]
    fn decimal_addition_is_exact() {
        let tenth = FixedPoint::Finite(dec!(0.1));
        let sum = tenth
            .checked_add(tenth)
            .and_then(|s| s.checked_add(tenth))
            .unwrap();
        assert_eq!(sum, FixedPoint::Finite(dec!(0.3)));
    }

    #[test]
    fn round_to_step_truncates_toward_zero() {
        assert_eq!(round_to_step(dec!(10.137), dec!(0.01)).unwrap(), dec!(10.13));
        assert_eq!(round_to_step(dec!(-10.137), dec!(0.01)).unwrap(), dec!(-10.13));
        assert_eq!(round_to_step(dec!(4500.10), dec!(0.25)).unwrap(), dec!(4500.00));
        assert_eq!(round_to_step(dec!(4500.25), dec!(0.25)).unwrap(), dec!(4500.25));
    }

    #[test]
    fn round_to_step_rejects_non_positive_step() {
        assert!(matches!(
            round_to_step(dec!(1), Decimal::ZERO),
            Err(NumericError::NonPositiveStep(_))
        ));
        assert!(round_to_step(dec!(1), dec!(-0.01)).is_err());
    }

    #[test]
    fn ticks_roundtrip_only_when_representable() {
        assert_eq!(to_ticks(dec!(-0.035), 4), Some(-350));
        assert_eq!(to_ticks(dec!(0.5), 4), Some(5000));
        assert_eq!(to_ticks(dec!(0.00001), 4), None);
        assert_eq!(from_ticks(-350, 4), dec!(-0.035));
    }

    #[test]
    fn format_uses_explicit_precision() {
        assert_eq!(format_fixed(dec!(0.035), 4), "0.0350");
        assert_eq!(format_fixed(dec!(12.3456), 2), "12.35");
        assert_eq!(FixedPoint::NegInfinity.format(4), "-inf");
    }

    #[test]
    fn display_precision_picks_finest_needed_ladder() {
        assert_eq!(display_precision(&[dec!(12), dec!(13)]), 0);
        assert_eq!(display_precision(&[dec!(12), dec!(12.5)]), 1);
        assert_eq!(display_precision(&[dec!(12.5), dec!(12.25)]), 2);
        assert_eq!(display_precision(&[dec!(12.255)]), 3);
        assert_eq!(display_precision(&[dec!(12.2555)]), 3);
        assert_eq!(display_precision(&[]), 0);
    }

    #[test]
    fn display_precision_is_independent_between_calls() {
        assert_eq!(display_precision(&[dec!(1.001)]), 3);
        assert_eq!(display_precision(&[dec!(1)]), 0);
    }

    #[test]
    fn parse_and_serde_roundtrip() {
        let values = [
            FixedPoint::Finite(dec!(-0.0350)),
            FixedPoint::PosInfinity,
            FixedPoint::NegInfinity,
        ];
        for v in values {
            let json = serde_json::to_string(&v).unwrap();
            let back: FixedPoint = serde_json::from_str(&json).unwrap();
            assert_eq!(v, back);
        }
        assert_eq!("nan".parse::<FixedPoint>(), Err(NumericError::NaN));
    }
}
