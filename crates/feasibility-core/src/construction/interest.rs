use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::construction::drawdown::DrawdownEntry;
use crate::error::FeasibilityError;
use crate::numeric;
use crate::types::{with_metadata, ComputationOutput, Currency, Money, Percent, Rate};
use crate::FeasibilityResult;

pub const DEFAULT_PERIODS_PER_YEAR: u32 = 12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A committed loan facility with its own pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanFacility {
    pub name: String,
    pub amount: Money,
    /// Annual rate as a decimal; facilities without a rate accrue no interest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    /// Defaults to the loan-level periods per year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods_per_year: Option<u32>,
    /// Interest is rolled into the loan balance rather than paid
    #[serde(default)]
    pub capitalize: bool,
    #[serde(default)]
    pub upfront_fee_pct: Percent,
    #[serde(default)]
    pub exit_fee_pct: Percent,
}

/// Loan parameters applied to a drawdown schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionLoanInput {
    /// Annual base rate as a decimal
    pub base_rate: Rate,
    /// Defaults to monthly accrual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods_per_year: Option<u32>,
    #[serde(default)]
    pub facilities: Vec<LoanFacility>,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestPeriod {
    pub period: String,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub average_balance: Money,
    pub interest: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityInterest {
    pub name: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    pub periods_per_year: u32,
    pub capitalize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<Money>,
    pub upfront_fee: Money,
    pub exit_fee: Money,
}

/// Which calculation produced `total_interest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestBasis {
    AverageBalance,
    Facility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionLoanInterestSchedule {
    pub currency: String,
    pub base_rate: Rate,
    pub periods_per_year: u32,
    /// Average-balance interest summed over the drawdown periods
    pub balance_interest: Money,
    /// Facility-level interest, when any facility carries a rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_interest: Option<Money>,
    pub total_interest: Money,
    pub interest_basis: InterestBasis,
    pub capitalized_interest: Money,
    pub upfront_fees: Money,
    pub exit_fees: Money,
    pub total_fees: Money,
    pub facilities: Vec<FacilityInterest>,
    pub periods: Vec<InterestPeriod>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Derive average-balance interest and facility fees from a drawdown schedule.
///
/// Facility interest, when present, replaces the balance-based total
/// rather than adding to it.
pub fn schedule_interest(
    schedule: &[DrawdownEntry],
    input: &ConstructionLoanInput,
) -> FeasibilityResult<ConstructionLoanInterestSchedule> {
    validate_input(input)?;

    let periods_per_year = input.periods_per_year.unwrap_or(DEFAULT_PERIODS_PER_YEAR);
    let periodic_rate = input.base_rate / Decimal::from(periods_per_year);
    let mut opening = Decimal::ZERO;
    let mut periods = Vec::with_capacity(schedule.len());

    for entry in schedule {
        let closing = entry.outstanding_debt;
        if closing < Decimal::ZERO {
            return Err(FeasibilityError::invalid(
                format!("drawdown:{}.outstanding_debt", entry.period),
                "Outstanding debt cannot be negative; repayments exceed draws",
            ));
        }
        let average = (opening + closing) / dec!(2);
        periods.push(InterestPeriod {
            period: entry.period.clone(),
            opening_balance: numeric::money(opening),
            closing_balance: numeric::money(closing),
            average_balance: numeric::money(average),
            interest: numeric::money(average * periodic_rate),
        });
        opening = closing;
    }
    let balance_interest: Money = periods.iter().map(|p| p.interest).sum();

    let facilities: Vec<FacilityInterest> = input
        .facilities
        .iter()
        .map(|f| FacilityInterest {
            name: f.name.clone(),
            amount: numeric::money(f.amount),
            rate: f.rate,
            periods_per_year: f.periods_per_year.unwrap_or(periods_per_year),
            capitalize: f.capitalize,
            interest: f.rate.map(|r| numeric::money(f.amount * r)),
            upfront_fee: numeric::money(f.amount * f.upfront_fee_pct / dec!(100)),
            exit_fee: numeric::money(f.amount * f.exit_fee_pct / dec!(100)),
        })
        .collect();

    let facility_interest = if facilities.iter().any(|f| f.interest.is_some()) {
        Some(facilities.iter().filter_map(|f| f.interest).sum::<Money>())
    } else {
        None
    };
    let (total_interest, interest_basis) = match facility_interest {
        Some(total) => (total, InterestBasis::Facility),
        None => (balance_interest, InterestBasis::AverageBalance),
    };

    let capitalized_interest: Money = facilities
        .iter()
        .filter(|f| f.capitalize)
        .filter_map(|f| f.interest)
        .sum();
    let upfront_fees: Money = facilities.iter().map(|f| f.upfront_fee).sum();
    let exit_fees: Money = facilities.iter().map(|f| f.exit_fee).sum();

    Ok(ConstructionLoanInterestSchedule {
        currency: input.currency.code().to_string(),
        base_rate: input.base_rate,
        periods_per_year,
        balance_interest: numeric::money(balance_interest),
        facility_interest: numeric::quantize_opt(facility_interest, numeric::Precision::Currency),
        total_interest: numeric::money(total_interest),
        interest_basis,
        capitalized_interest: numeric::money(capitalized_interest),
        upfront_fees: numeric::money(upfront_fees),
        exit_fees: numeric::money(exit_fees),
        total_fees: numeric::money(upfront_fees + exit_fees),
        facilities,
        periods,
    })
}

/// Accrue construction-loan interest and wrap it in the standard envelope.
pub fn accrue_construction_interest(
    schedule: &[DrawdownEntry],
    input: &ConstructionLoanInput,
) -> FeasibilityResult<ComputationOutput<ConstructionLoanInterestSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let result = schedule_interest(schedule, input)?;

    if result.interest_basis == InterestBasis::Facility && !schedule.is_empty() {
        warnings.push(format!(
            "Facility interest {} supersedes average-balance interest {}",
            result.total_interest, result.balance_interest
        ));
    }
    if schedule.is_empty() && input.facilities.is_empty() {
        warnings.push("No drawdown schedule or facilities supplied; interest is zero".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Construction Loan Interest (average balance × rate / periods per year)",
        input,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &ConstructionLoanInput) -> FeasibilityResult<()> {
    if input.periods_per_year == Some(0) {
        return Err(FeasibilityError::invalid(
            "periods_per_year",
            "Periods per year must be at least 1",
        ));
    }
    if input.base_rate < Decimal::ZERO {
        return Err(FeasibilityError::invalid(
            "base_rate",
            "Base rate cannot be negative",
        ));
    }

    for f in &input.facilities {
        let field = |name: &str| format!("facility:{}.{name}", f.name);
        if f.amount < Decimal::ZERO {
            return Err(FeasibilityError::invalid(
                field("amount"),
                "Facility amount cannot be negative",
            ));
        }
        if f.rate.is_some_and(|r| r < Decimal::ZERO) {
            return Err(FeasibilityError::invalid(
                field("rate"),
                "Facility rate cannot be negative",
            ));
        }
        if f.periods_per_year == Some(0) {
            return Err(FeasibilityError::invalid(
                field("periods_per_year"),
                "Periods per year must be at least 1",
            ));
        }
        if f.upfront_fee_pct < Decimal::ZERO || f.exit_fee_pct < Decimal::ZERO {
            return Err(FeasibilityError::invalid(
                field("fees"),
                "Fee percentages cannot be negative",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::drawdown::{build_drawdown_schedule, DrawdownInput};
    use rust_decimal_macros::dec;

    fn sample_schedule() -> Vec<DrawdownEntry> {
        let periods = vec![
            DrawdownInput {
                period: "M1".into(),
                equity_draw: dec!(0),
                debt_draw: dec!(1200),
            },
            DrawdownInput {
                period: "M2".into(),
                equity_draw: dec!(0),
                debt_draw: dec!(1200),
            },
        ];
        build_drawdown_schedule(&periods, &Currency::USD).entries
    }

    fn loan(facilities: Vec<LoanFacility>) -> ConstructionLoanInput {
        ConstructionLoanInput {
            base_rate: dec!(0.06),
            periods_per_year: Some(12),
            facilities,
            currency: Currency::USD,
        }
    }

    #[test]
    fn test_negative_outstanding_debt_rejected() {
        let periods = vec![
            DrawdownInput {
                period: "M1".into(),
                equity_draw: dec!(0),
                debt_draw: dec!(0),
            },
            DrawdownInput {
                period: "M2".into(),
                equity_draw: dec!(0),
                debt_draw: dec!(-100),
            },
        ];
        let schedule = build_drawdown_schedule(&periods, &Currency::USD).entries;
        let mut input = loan(vec![]);
        input.base_rate = dec!(0.12);

        let err = schedule_interest(&schedule, &input).unwrap_err();
        assert!(matches!(
            err,
            FeasibilityError::InvalidInput { ref field, .. } if field == "drawdown:M2.outstanding_debt"
        ));
    }

    #[test]
    fn test_partial_repayment_keeps_interest_non_negative() {
        let periods = vec![
            DrawdownInput {
                period: "M1".into(),
                equity_draw: dec!(0),
                debt_draw: dec!(1000),
            },
            DrawdownInput {
                period: "M2".into(),
                equity_draw: dec!(0),
                debt_draw: dec!(-400),
            },
        ];
        let schedule = build_drawdown_schedule(&periods, &Currency::USD).entries;
        let result = schedule_interest(&schedule, &loan(vec![])).unwrap();
        // M1: avg 500 × 0.005 = 2.50; M2: avg 800 × 0.005 = 4.00
        assert_eq!(result.total_interest, dec!(6.50));
        assert!(result.periods.iter().all(|p| p.interest >= Decimal::ZERO));
    }

    #[test]
    fn test_average_balance_interest() {
        let result = schedule_interest(&sample_schedule(), &loan(vec![])).unwrap();
        // M1: avg 600 × 0.005 = 3.00; M2: avg 1800 × 0.005 = 9.00
        assert_eq!(result.periods[0].interest, dec!(3.00));
        assert_eq!(result.periods[1].opening_balance, dec!(1200));
        assert_eq!(result.periods[1].interest, dec!(9.00));
        assert_eq!(result.total_interest, dec!(12.00));
        assert_eq!(result.interest_basis, InterestBasis::AverageBalance);
    }

    #[test]
    fn test_facility_interest_supersedes() {
        let facility = LoanFacility {
            name: "Senior".into(),
            amount: dec!(10000),
            rate: Some(dec!(0.07)),
            periods_per_year: None,
            capitalize: true,
            upfront_fee_pct: dec!(1.5),
            exit_fee_pct: dec!(0.5),
        };
        let result = schedule_interest(&sample_schedule(), &loan(vec![facility])).unwrap();
        assert_eq!(result.balance_interest, dec!(12.00));
        assert_eq!(result.total_interest, dec!(700.00));
        assert_eq!(result.interest_basis, InterestBasis::Facility);
        assert_eq!(result.capitalized_interest, dec!(700.00));
        assert_eq!(result.upfront_fees, dec!(150.00));
        assert_eq!(result.exit_fees, dec!(50.00));
        assert_eq!(result.total_fees, dec!(200.00));
        assert_eq!(result.facilities[0].periods_per_year, 12);
    }

    #[test]
    fn test_facility_without_rate_keeps_balance_basis() {
        let facility = LoanFacility {
            name: "Standby".into(),
            amount: dec!(5000),
            rate: None,
            periods_per_year: Some(4),
            capitalize: false,
            upfront_fee_pct: dec!(1),
            exit_fee_pct: dec!(0),
        };
        let result = schedule_interest(&sample_schedule(), &loan(vec![facility])).unwrap();
        assert_eq!(result.interest_basis, InterestBasis::AverageBalance);
        assert_eq!(result.total_interest, dec!(12.00));
        assert_eq!(result.upfront_fees, dec!(50.00));
    }

    #[test]
    fn test_zero_periods_per_year_rejected() {
        let mut input = loan(vec![]);
        input.periods_per_year = Some(0);
        assert!(schedule_interest(&sample_schedule(), &input).is_err());
    }
}
