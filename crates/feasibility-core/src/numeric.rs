//! Fixed-point quantization helpers.
//!
//! Every rounding step in the engine goes through [`quantize`] with an
//! explicit [`Precision`]. Rounding is half-up (ties away from zero), so
//! `2.345` becomes `2.35` and `-2.345` becomes `-2.35`.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Named decimal scales used across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Monetary amounts: 2 places
    Currency,
    /// Ratios, shares and rates: 4 places
    Ratio,
    /// Floor areas: 2 places
    Area,
    /// Durations in months or years: 1 place
    Duration,
}

impl Precision {
    pub const fn places(self) -> u32 {
        match self {
            Precision::Currency | Precision::Area => 2,
            Precision::Ratio => 4,
            Precision::Duration => 1,
        }
    }
}

/// Round half-up to the given precision and pin the scale, so `100` becomes `100.00`.
pub fn quantize(value: Decimal, precision: Precision) -> Decimal {
    let places = precision.places();
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    // round_dp never widens the scale; pad it so output text is stable
    if rounded.scale() < places {
        rounded.rescale(places);
    }
    rounded
}

pub fn quantize_opt(value: Option<Decimal>, precision: Precision) -> Option<Decimal> {
    value.map(|v| quantize(v, precision))
}

/// Currency shorthand.
pub fn money(value: Decimal) -> Decimal {
    quantize(value, Precision::Currency)
}

/// Ratio shorthand.
pub fn ratio(value: Decimal) -> Decimal {
    quantize(value, Precision::Ratio)
}

/// Parse and quantize a textual decimal. Malformed text yields `None`
/// rather than an error so the surrounding computation can carry on.
pub fn parse_quantized(raw: &str, precision: Precision) -> Option<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
        .map(|v| quantize(v, precision))
}

/// `numerator / denominator`, or `None` when the denominator is zero.
pub fn checked_ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_half_up_currency() {
        assert_eq!(quantize(dec!(2.345), Precision::Currency), dec!(2.35));
        assert_eq!(quantize(dec!(2.344), Precision::Currency), dec!(2.34));
        assert_eq!(quantize(dec!(-2.345), Precision::Currency), dec!(-2.35));
    }

    #[test]
    fn test_scale_is_padded() {
        let q = quantize(dec!(100), Precision::Currency);
        assert_eq!(q.to_string(), "100.00");
        assert_eq!(quantize(dec!(0.6), Precision::Ratio).to_string(), "0.6000");
    }

    #[test]
    fn test_duration_and_area() {
        assert_eq!(quantize(dec!(14.25), Precision::Duration), dec!(14.3));
        assert_eq!(quantize(dec!(1250.555), Precision::Area), dec!(1250.56));
    }

    #[test]
    fn test_parse_quantized_malformed() {
        assert_eq!(parse_quantized("not-a-number", Precision::Currency), None);
        assert_eq!(
            parse_quantized(" 12.345 ", Precision::Currency),
            Some(dec!(12.35))
        );
        assert_eq!(parse_quantized("1e2", Precision::Currency), Some(dec!(100)));
    }

    #[test]
    fn test_checked_ratio_zero_denominator() {
        assert_eq!(checked_ratio(dec!(5), Decimal::ZERO), None);
        assert_eq!(checked_ratio(dec!(5), dec!(2)), Some(dec!(2.5)));
    }
}
