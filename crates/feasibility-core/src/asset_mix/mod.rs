pub mod breakdown;
pub mod portfolio;

use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{with_metadata, ComputationOutput};
use crate::FeasibilityResult;

pub use breakdown::{asset_breakdown, AssetFinanceBreakdown, AssetFinanceInput, RiskLevel};
pub use portfolio::{summarize_portfolio, PortfolioSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMixOutput {
    pub breakdowns: Vec<AssetFinanceBreakdown>,
    pub portfolio: PortfolioSummary,
}

/// Break down every asset type and aggregate the portfolio.
pub fn analyze_asset_mix(
    inputs: &[AssetFinanceInput],
) -> FeasibilityResult<ComputationOutput<AssetMixOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let breakdowns = inputs
        .iter()
        .map(asset_breakdown)
        .collect::<FeasibilityResult<Vec<_>>>()?;
    let portfolio = summarize_portfolio(&breakdowns);

    if portfolio.allocation_pct_total > dec!(100) {
        warnings.push(format!(
            "Asset allocations total {}%, above 100%",
            portfolio.allocation_pct_total
        ));
    }
    for b in &breakdowns {
        if b.gross_annual_rent.is_zero() {
            warnings.push(format!(
                "Asset '{}' has no rent roll or revenue estimate",
                b.asset_type
            ));
        }
        if b.noi <= Decimal::ZERO {
            warnings.push(format!(
                "Asset '{}' has non-positive NOI; payback is undefined",
                b.asset_type
            ));
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Asset-Level Finance Breakdown (NOI, payback, stabilised yield)",
        &serde_json::json!({ "asset_types": inputs.len() }),
        warnings,
        elapsed,
        AssetMixOutput {
            breakdowns,
            portfolio,
        },
    ))
}
