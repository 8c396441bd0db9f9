use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FeasibilityError;
use crate::numeric::{self, checked_ratio, Precision};
use crate::types::{Money, Percent};
use crate::FeasibilityResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Development risk grade, ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    #[serde(alias = "medium")]
    Moderate,
    High,
    Elevated,
}

impl RiskLevel {
    pub fn priority(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Moderate => 2,
            RiskLevel::High => 3,
            RiskLevel::Elevated => 4,
        }
    }
}

/// Leasing and allocation assumptions for one asset type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetFinanceInput {
    pub asset_type: String,
    /// Share of the scheme, 0–100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_pct: Option<Percent>,
    /// Lettable area
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent_per_area: Option<Money>,
    /// 0–100
    #[serde(default)]
    pub vacancy_pct: Percent,
    /// Operating expenses as a percentage of effective income, 0–100
    #[serde(default)]
    pub opex_pct: Percent,
    /// Annual revenue used when area or rent is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_revenue: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capex: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorption_months: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSource {
    RentRoll,
    EstimatedRevenue,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetFinanceBreakdown {
    pub asset_type: String,
    pub allocation_pct: Option<Percent>,
    pub area: Option<Decimal>,
    pub revenue_source: RevenueSource,
    pub gross_annual_rent: Money,
    pub effective_income: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub capex: Option<Money>,
    /// capex / NOI; `None` when NOI ≤ 0 or capex is absent
    pub payback_years: Option<Decimal>,
    /// NOI / capex; `None` when capex is zero or absent
    pub stabilized_yield: Option<Decimal>,
    pub absorption_months: Option<Decimal>,
    pub risk_level: Option<RiskLevel>,
    pub risk_priority: Option<u8>,
}

/// NOI, payback and yield for one asset type.
pub fn asset_breakdown(input: &AssetFinanceInput) -> FeasibilityResult<AssetFinanceBreakdown> {
    validate_input(input)?;

    let (gross, revenue_source) = match (input.area, input.monthly_rent_per_area) {
        (Some(area), Some(rent)) => (area * rent * MONTHS_PER_YEAR, RevenueSource::RentRoll),
        _ => match input.estimated_revenue {
            Some(revenue) => (revenue, RevenueSource::EstimatedRevenue),
            None => (Decimal::ZERO, RevenueSource::Missing),
        },
    };

    let effective = gross * (Decimal::ONE - input.vacancy_pct / dec!(100));
    let opex = effective * input.opex_pct / dec!(100);
    let noi = effective - opex;

    let payback_years = match input.capex {
        Some(capex) if noi > Decimal::ZERO => {
            Some(numeric::quantize(capex / noi, Precision::Duration))
        }
        _ => None,
    };
    let stabilized_yield = input
        .capex
        .and_then(|capex| checked_ratio(noi, capex))
        .map(numeric::ratio);

    Ok(AssetFinanceBreakdown {
        asset_type: input.asset_type.clone(),
        allocation_pct: input.allocation_pct.map(numeric::ratio),
        area: numeric::quantize_opt(input.area, Precision::Area),
        revenue_source,
        gross_annual_rent: numeric::money(gross),
        effective_income: numeric::money(effective),
        operating_expenses: numeric::money(opex),
        noi: numeric::money(noi),
        capex: input.capex.map(numeric::money),
        payback_years,
        stabilized_yield,
        absorption_months: numeric::quantize_opt(input.absorption_months, Precision::Duration),
        risk_level: input.risk_level,
        risk_priority: input.risk_level.map(RiskLevel::priority),
    })
}

fn validate_input(input: &AssetFinanceInput) -> FeasibilityResult<()> {
    let field = |name: &str| format!("asset:{}.{name}", input.asset_type);

    if input.vacancy_pct < Decimal::ZERO || input.vacancy_pct > dec!(100) {
        return Err(FeasibilityError::invalid(
            field("vacancy_pct"),
            "Vacancy must be between 0 and 100",
        ));
    }
    if input.opex_pct < Decimal::ZERO {
        return Err(FeasibilityError::invalid(
            field("opex_pct"),
            "Operating expense percentage cannot be negative",
        ));
    }
    if input.area.is_some_and(|a| a < Decimal::ZERO) {
        return Err(FeasibilityError::invalid(field("area"), "Area cannot be negative"));
    }
    if input.capex.is_some_and(|c| c < Decimal::ZERO) {
        return Err(FeasibilityError::invalid(field("capex"), "Capex cannot be negative"));
    }
    Ok(())
}
