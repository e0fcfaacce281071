//! Conversion between the indicator math (`f64`) and the decimal values the
//! rest of the engine carries. Conversion happens once, at the feature
//! boundary; everything downstream stays in `Decimal`.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round to two decimal places, half away from zero. `None` for non-finite
/// input, so NaN/infinity can never leak into a snapshot.
pub fn round2(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Round to a whole number (volume figures)
pub fn round0(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

/// Two-decimal rounding for values already in `Decimal`
pub fn round2_dec(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Percent difference of `value` from `reference`: (value - reference) / reference * 100
pub fn pct_diff(value: Decimal, reference: Decimal) -> Decimal {
    if reference.is_zero() {
        return Decimal::ZERO;
    }
    (value - reference) / reference * Decimal::ONE_HUNDRED
}
