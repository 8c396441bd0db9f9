use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::breakdown::{AssetFinanceBreakdown, RiskLevel};
use crate::numeric::{self, checked_ratio, Precision};
use crate::types::{Money, Percent};

/// Totals across every asset type in a scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub asset_count: usize,
    pub total_area: Decimal,
    pub total_gross_rent: Money,
    pub total_effective_income: Money,
    pub total_operating_expenses: Money,
    pub total_noi: Money,
    pub total_capex: Money,
    pub portfolio_yield: Option<Decimal>,
    pub portfolio_payback_years: Option<Decimal>,
    pub allocation_pct_total: Percent,
    /// Highest-priority risk level present, not the most common one
    pub dominant_risk: Option<RiskLevel>,
    pub longest_absorption_months: Option<Decimal>,
}

pub fn summarize_portfolio(breakdowns: &[AssetFinanceBreakdown]) -> PortfolioSummary {
    let sum = |f: fn(&AssetFinanceBreakdown) -> Decimal| -> Decimal {
        breakdowns.iter().map(f).sum()
    };

    let total_noi = sum(|b| b.noi);
    let total_capex = sum(|b| b.capex.unwrap_or_default());

    let portfolio_payback_years = if total_noi > Decimal::ZERO && !total_capex.is_zero() {
        Some(numeric::quantize(total_capex / total_noi, Precision::Duration))
    } else {
        None
    };

    PortfolioSummary {
        asset_count: breakdowns.len(),
        total_area: numeric::quantize(sum(|b| b.area.unwrap_or_default()), Precision::Area),
        total_gross_rent: numeric::money(sum(|b| b.gross_annual_rent)),
        total_effective_income: numeric::money(sum(|b| b.effective_income)),
        total_operating_expenses: numeric::money(sum(|b| b.operating_expenses)),
        total_noi: numeric::money(total_noi),
        total_capex: numeric::money(total_capex),
        portfolio_yield: checked_ratio(total_noi, total_capex).map(numeric::ratio),
        portfolio_payback_years,
        allocation_pct_total: numeric::ratio(sum(|b| b.allocation_pct.unwrap_or_default())),
        dominant_risk: breakdowns.iter().filter_map(|b| b.risk_level).max(),
        longest_absorption_months: breakdowns.iter().filter_map(|b| b.absorption_months).max(),
    }
}
