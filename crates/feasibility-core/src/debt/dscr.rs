use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FeasibilityError;
use crate::numeric::{self, Precision};
use crate::types::{with_metadata, ComputationOutput, Currency, Money};
use crate::FeasibilityResult;

/// Default minimum DSCR covenant used for breach counting.
pub const DEFAULT_DSCR_COVENANT: Decimal = dec!(1.20);

// ---------------------------------------------------------------------------
// Coverage ratio
// ---------------------------------------------------------------------------

/// A debt service coverage ratio. Zero debt service produces a signed
/// infinity and a zero NOI produces a signed zero; neither is folded into
/// an ordinary decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageRatio {
    Finite(Decimal),
    PositiveInfinity,
    NegativeInfinity,
    NegativeZero,
}

impl CoverageRatio {
    /// Ratio of `noi` to `debt_service`, quantized to 4 places when finite.
    ///
    /// A quotient outside the decimal range is rejected rather than wrapped.
    pub fn of(noi: Money, debt_service: Money) -> FeasibilityResult<Self> {
        if noi.is_zero() {
            return Ok(CoverageRatio::NegativeZero);
        }
        if debt_service.is_zero() {
            return Ok(if noi > Decimal::ZERO {
                CoverageRatio::PositiveInfinity
            } else {
                CoverageRatio::NegativeInfinity
            });
        }
        let ratio = noi.checked_div(debt_service).ok_or_else(|| {
            FeasibilityError::invalid(
                "debt_service",
                format!("NOI {noi} over debt service {debt_service} exceeds decimal range"),
            )
        })?;
        Ok(CoverageRatio::Finite(numeric::ratio(ratio)))
    }

    /// Decimal value, with the signed zero reported as zero. `None` for infinities.
    pub fn finite(&self) -> Option<Decimal> {
        match self {
            CoverageRatio::Finite(r) => Some(*r),
            CoverageRatio::NegativeZero => Some(Decimal::ZERO),
            _ => None,
        }
    }

    /// Lossy conversion for consumers that need IEEE semantics.
    pub fn to_f64(&self) -> f64 {
        match self {
            CoverageRatio::Finite(r) => r.to_f64().unwrap_or(f64::NAN),
            CoverageRatio::PositiveInfinity => f64::INFINITY,
            CoverageRatio::NegativeInfinity => f64::NEG_INFINITY,
            CoverageRatio::NegativeZero => -0.0,
        }
    }

    pub fn is_below(&self, threshold: Decimal) -> bool {
        match self {
            CoverageRatio::PositiveInfinity => false,
            CoverageRatio::NegativeInfinity => true,
            other => other.finite().is_some_and(|r| r < threshold),
        }
    }
}

impl fmt::Display for CoverageRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageRatio::Finite(r) => write!(f, "{r}"),
            CoverageRatio::PositiveInfinity => f.write_str("Infinity"),
            CoverageRatio::NegativeInfinity => f.write_str("-Infinity"),
            CoverageRatio::NegativeZero => f.write_str("-0.0000"),
        }
    }
}

impl FromStr for CoverageRatio {
    type Err = FeasibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Infinity" | "inf" => Ok(CoverageRatio::PositiveInfinity),
            "-Infinity" | "-inf" => Ok(CoverageRatio::NegativeInfinity),
            "-0" | "-0.0" | "-0.0000" => Ok(CoverageRatio::NegativeZero),
            other => numeric::parse_quantized(other, Precision::Ratio)
                .map(CoverageRatio::Finite)
                .ok_or_else(|| {
                    FeasibilityError::invalid("ratio", format!("'{other}' is not a decimal"))
                }),
        }
    }
}

impl Serialize for CoverageRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CoverageRatio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Input for a DSCR timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DscrInput {
    /// Period labels; defaults to "Period 1..n"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    pub noi: Vec<Money>,
    pub debt_service: Vec<Money>,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DscrEntry {
    pub period: String,
    pub noi: Money,
    pub debt_service: Money,
    pub ratio: CoverageRatio,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DscrSummary {
    /// Lowest finite ratio across the timeline
    pub min_ratio: Option<Decimal>,
    /// Mean of finite ratios
    pub average_ratio: Option<Decimal>,
    pub covenant: Decimal,
    pub periods_below_covenant: usize,
    pub infinite_periods: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DscrOutput {
    pub entries: Vec<DscrEntry>,
    pub summary: DscrSummary,
}

/// Per-period coverage ratios for parallel NOI and debt-service sequences.
pub fn dscr_timeline(
    noi: &[Money],
    debt_service: &[Money],
) -> FeasibilityResult<Vec<CoverageRatio>> {
    if noi.len() != debt_service.len() {
        return Err(FeasibilityError::invalid(
            "debt_service",
            format!(
                "NOI has {} periods but debt service has {}",
                noi.len(),
                debt_service.len()
            ),
        ));
    }
    noi.iter()
        .zip(debt_service)
        .map(|(n, ds)| CoverageRatio::of(*n, *ds))
        .collect()
}

/// Labelled DSCR entries for each period.
pub fn build_dscr_timeline(input: &DscrInput) -> FeasibilityResult<Vec<DscrEntry>> {
    let ratios = dscr_timeline(&input.noi, &input.debt_service)?;

    if let Some(labels) = &input.labels {
        if labels.len() != ratios.len() {
            return Err(FeasibilityError::invalid(
                "labels",
                format!(
                    "{} period labels supplied for {} periods",
                    labels.len(),
                    ratios.len()
                ),
            ));
        }
    }

    let currency = input.currency.code().to_string();
    Ok(ratios
        .into_iter()
        .enumerate()
        .map(|(i, ratio)| DscrEntry {
            period: input
                .labels
                .as_ref()
                .map(|l| l[i].clone())
                .unwrap_or_else(|| format!("Period {}", i + 1)),
            noi: numeric::money(input.noi[i]),
            debt_service: numeric::money(input.debt_service[i]),
            ratio,
            currency: currency.clone(),
        })
        .collect())
}

pub fn summarize_dscr(entries: &[DscrEntry], covenant: Decimal) -> DscrSummary {
    let finite: Vec<Decimal> = entries.iter().filter_map(|e| e.ratio.finite()).collect();
    let average_ratio = if finite.is_empty() {
        None
    } else {
        let sum: Decimal = finite.iter().sum();
        Some(numeric::ratio(sum / Decimal::from(finite.len() as u64)))
    };

    DscrSummary {
        min_ratio: finite.iter().min().copied(),
        average_ratio,
        covenant,
        periods_below_covenant: entries.iter().filter(|e| e.ratio.is_below(covenant)).count(),
        infinite_periods: entries.len() - finite.len(),
    }
}

/// Build the DSCR timeline with a covenant summary.
pub fn analyze_dscr(
    input: &DscrInput,
    covenant: Decimal,
) -> FeasibilityResult<ComputationOutput<DscrOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let entries = build_dscr_timeline(input)?;
    let summary = summarize_dscr(&entries, covenant);

    if summary.periods_below_covenant > 0 {
        warnings.push(format!(
            "{} of {} periods fall below the {covenant}x DSCR covenant",
            summary.periods_below_covenant,
            entries.len()
        ));
    }
    if entries.iter().any(|e| e.ratio == CoverageRatio::NegativeInfinity) {
        warnings.push("Negative NOI with no debt service in at least one period".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Debt Service Coverage Ratio Timeline",
        &serde_json::json!({
            "periods": input.noi.len(),
            "covenant": covenant.to_string(),
            "currency": input.currency.code(),
        }),
        warnings,
        elapsed,
        DscrOutput { entries, summary },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_finite_ratio_quantized() {
        assert_eq!(
            CoverageRatio::of(dec!(1000), dec!(750)).unwrap(),
            CoverageRatio::Finite(dec!(1.3333))
        );
    }

    #[test]
    fn test_infinities_and_signed_zero() {
        let noi = [dec!(1000), dec!(-500), dec!(0)];
        let debt_service = [dec!(0), dec!(0), dec!(200)];
        let ratios = dscr_timeline(&noi, &debt_service).unwrap();
        assert_eq!(
            ratios,
            vec![
                CoverageRatio::PositiveInfinity,
                CoverageRatio::NegativeInfinity,
                CoverageRatio::NegativeZero,
            ]
        );
        assert_eq!(ratios[2].to_string(), "-0.0000");
        assert!(ratios[2].to_f64().is_sign_negative());
        assert_eq!(ratios[2].to_f64(), 0.0);
    }

    #[test]
    fn test_zero_over_zero_is_negative_zero() {
        assert_eq!(
            CoverageRatio::of(dec!(0), dec!(0)).unwrap(),
            CoverageRatio::NegativeZero
        );
    }

    #[test]
    fn test_parsed_ratio_is_quantized() {
        assert_eq!(
            "1.23456".parse::<CoverageRatio>().unwrap(),
            CoverageRatio::Finite(dec!(1.2346))
        );
        assert_eq!("-0.0000".parse::<CoverageRatio>().unwrap(), CoverageRatio::NegativeZero);
        assert!("n/a".parse::<CoverageRatio>().is_err());
    }

    #[test]
    fn test_out_of_range_ratio_is_rejected() {
        let noi = [dec!(100000000000000000000)];
        let debt_service = [dec!(0.0000000001)];
        let err = dscr_timeline(&noi, &debt_service).unwrap_err();
        assert!(matches!(
            err,
            FeasibilityError::InvalidInput { ref field, .. } if field == "debt_service"
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let err = dscr_timeline(&[dec!(1)], &[dec!(1), dec!(2)]).unwrap_err();
        assert!(matches!(err, FeasibilityError::InvalidInput { .. }));
    }

    #[test]
    fn test_label_mismatch() {
        let input = DscrInput {
            labels: Some(vec!["Y1".into()]),
            noi: vec![dec!(100), dec!(120)],
            debt_service: vec![dec!(80), dec!(80)],
            currency: Currency::USD,
        };
        assert!(build_dscr_timeline(&input).is_err());
    }

    #[test]
    fn test_serialized_ratio_strings() {
        let json = serde_json::to_value(vec![
            CoverageRatio::PositiveInfinity,
            CoverageRatio::Finite(dec!(1.2500)),
        ])
        .unwrap();
        assert_eq!(json, serde_json::json!(["Infinity", "1.2500"]));
        let back: CoverageRatio = serde_json::from_str("\"-Infinity\"").unwrap();
        assert_eq!(back, CoverageRatio::NegativeInfinity);
    }

    #[test]
    fn test_summary_counts_breaches() {
        let input = DscrInput {
            labels: None,
            noi: vec![dec!(100), dec!(150), dec!(200), dec!(50)],
            debt_service: vec![dec!(100), dec!(100), dec!(0), dec!(100)],
            currency: Currency::GBP,
        };
        let out = analyze_dscr(&input, DEFAULT_DSCR_COVENANT).unwrap();
        let summary = &out.result.summary;
        assert_eq!(out.result.entries[0].period, "Period 1");
        assert_eq!(summary.min_ratio, Some(dec!(0.5)));
        assert_eq!(summary.average_ratio, Some(dec!(1.0)));
        assert_eq!(summary.periods_below_covenant, 2);
        assert_eq!(summary.infinite_periods, 1);
        assert_eq!(out.warnings.len(), 1);
    }
}
