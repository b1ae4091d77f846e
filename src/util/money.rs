//! Cent rounding and lenient numeric parsing for money and size fields.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to whole cents (half-up for non-negative amounts) and pins the
/// scale to two digits so serialised values always read `12.50`, never `12.5`.
pub fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Parses a price or measurement, returning zero for anything unusable.
///
/// Accepts a leading numeric portion followed by a unit (`"4 inch"`, `"12in"`,
/// `"4\""`). Negative or non-numeric input yields zero.
pub fn parse_lenient(raw: &str) -> Decimal {
    let trimmed = raw.trim().trim_start_matches('$');
    let numeric: String = trimmed
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();

    if numeric.is_empty() {
        return Decimal::ZERO;
    }

    Decimal::from_str(&numeric)
        .ok()
        .filter(|value| !value.is_sign_negative())
        .unwrap_or(Decimal::ZERO)
}

/// Converts an `f64` coming off the wire, mapping NaN and negatives to zero.
pub fn from_f64_lenient(value: f64) -> Decimal {
    if !value.is_finite() || value < 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64_retain(value)
        .map(|exact| exact.round_dp(6))
        .unwrap_or(Decimal::ZERO)
}
