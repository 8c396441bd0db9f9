use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FeasibilityError;
use crate::numeric;
use crate::types::{Money, Percent, Rate};
use crate::FeasibilityResult;

/// One what-if parameter with signed percentage deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityBand {
    pub parameter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioLabel {
    Low,
    Base,
    High,
}

impl fmt::Display for ScenarioLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScenarioLabel::Low => "Low",
            ScenarioLabel::Base => "Base",
            ScenarioLabel::High => "High",
        })
    }
}

impl SensitivityBand {
    /// Non-null deltas in Low, Base, High order.
    pub fn scenarios(&self) -> Vec<(ScenarioLabel, Percent)> {
        [
            (ScenarioLabel::Low, self.low),
            (ScenarioLabel::Base, self.base),
            (ScenarioLabel::High, self.high),
        ]
        .into_iter()
        .filter_map(|(label, delta)| delta.map(|d| (label, d)))
        .collect()
    }
}

/// Baseline results the deltas are applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityBaseline {
    pub escalated_cost: Money,
    pub npv: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_interest: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityOutcome {
    pub parameter: String,
    pub scenario: ScenarioLabel,
    pub delta: Percent,
    pub delta_label: String,
    pub npv: Money,
    pub irr: Option<Rate>,
    pub escalated_cost: Money,
    pub total_interest: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Every band needs a parameter name and at least one delta.
pub fn validate_bands(bands: &[SensitivityBand]) -> FeasibilityResult<()> {
    for (i, band) in bands.iter().enumerate() {
        if band.parameter.trim().is_empty() {
            return Err(FeasibilityError::invalid(
                format!("bands[{i}].parameter"),
                "Parameter name cannot be empty",
            ));
        }
        if band.low.is_none() && band.base.is_none() && band.high.is_none() {
            return Err(FeasibilityError::invalid(
                format!("bands[{i}]"),
                format!(
                    "Band '{}' needs at least one of low, base or high",
                    band.parameter
                ),
            ));
        }
    }
    Ok(())
}

/// Apply each band's deltas to the baseline.
///
/// NPV moves by the full delta; escalated cost and interest move by half
/// of it, and IRR shifts by a tenth of a percentage point per percent.
pub fn evaluate_bands(
    bands: &[SensitivityBand],
    baseline: &SensitivityBaseline,
) -> FeasibilityResult<Vec<SensitivityOutcome>> {
    validate_bands(bands)?;

    let outcomes = bands
        .iter()
        .flat_map(|band| {
            band.scenarios()
                .into_iter()
                .map(move |(scenario, delta)| apply_delta(band, scenario, delta, baseline))
        })
        .collect();
    Ok(outcomes)
}

fn apply_delta(
    band: &SensitivityBand,
    scenario: ScenarioLabel,
    delta: Percent,
    baseline: &SensitivityBaseline,
) -> SensitivityOutcome {
    let revenue_factor = Decimal::ONE + delta / dec!(100);
    let cost_factor = Decimal::ONE + delta / dec!(200);

    SensitivityOutcome {
        parameter: band.parameter.clone(),
        scenario,
        delta,
        delta_label: delta_label(delta),
        npv: numeric::money(baseline.npv * revenue_factor),
        irr: baseline.irr.map(|irr| numeric::ratio(irr + delta / dec!(1000))),
        escalated_cost: numeric::money(baseline.escalated_cost * cost_factor),
        total_interest: baseline
            .total_interest
            .map(|interest| numeric::money(interest * cost_factor)),
        notes: band.notes.clone(),
    }
}

fn delta_label(delta: Percent) -> String {
    let d = delta.normalize();
    if d > Decimal::ZERO {
        format!("+{d}%")
    } else {
        format!("{d}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn baseline() -> SensitivityBaseline {
        SensitivityBaseline {
            escalated_cost: dec!(2000000),
            npv: dec!(1000000),
            irr: Some(dec!(0.1200)),
            total_interest: Some(dec!(80000)),
        }
    }

    #[test]
    fn test_cost_moves_at_half_delta() {
        let band = SensitivityBand {
            parameter: "construction_cost".into(),
            low: Some(dec!(-10)),
            base: None,
            high: Some(dec!(10)),
            notes: Some("tender range".into()),
        };
        let outcomes = evaluate_bands(&[band], &baseline()).unwrap();
        assert_eq!(outcomes.len(), 2);

        let high = &outcomes[1];
        assert_eq!(high.scenario, ScenarioLabel::High);
        assert_eq!(high.delta_label, "+10%");
        assert_eq!(high.escalated_cost, dec!(2100000.00));
        assert_eq!(high.total_interest, Some(dec!(84000.00)));
        assert_eq!(high.irr, Some(dec!(0.1300)));
        assert_eq!(high.notes.as_deref(), Some("tender range"));

        let low = &outcomes[0];
        assert_eq!(low.delta_label, "-10%");
        assert_eq!(low.escalated_cost, dec!(1900000.00));
        assert_eq!(low.irr, Some(dec!(0.1100)));
    }

    #[test]
    fn test_missing_baseline_irr_stays_missing() {
        let mut base = baseline();
        base.irr = None;
        base.total_interest = None;
        let band = SensitivityBand {
            parameter: "rent".into(),
            low: None,
            base: Some(dec!(0)),
            high: None,
            notes: None,
        };
        let outcomes = evaluate_bands(&[band], &base).unwrap();
        assert_eq!(outcomes[0].delta_label, "0%");
        assert_eq!(outcomes[0].irr, None);
        assert_eq!(outcomes[0].total_interest, None);
        assert_eq!(outcomes[0].npv, dec!(1000000.00));
    }

    #[test]
    fn test_band_without_deltas_rejected() {
        let band = SensitivityBand {
            parameter: "rent".into(),
            low: None,
            base: None,
            high: None,
            notes: None,
        };
        let err = evaluate_bands(&[band], &baseline()).unwrap_err();
        assert!(matches!(err, FeasibilityError::InvalidInput { .. }));
    }

    #[test]
    fn test_fractional_delta_label() {
        assert_eq!(delta_label(dec!(2.50)), "+2.5%");
        assert_eq!(delta_label(dec!(-7.5)), "-7.5%");
    }
}
