use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use feasibility_core::construction::drawdown::{self, DrawdownInput};
use feasibility_core::construction::interest::{self, ConstructionLoanInput};
use feasibility_core::{Currency, EngineConfig};

use crate::input;

#[derive(Deserialize)]
struct DrawdownRequest {
    #[serde(default)]
    currency: Currency,
    periods: Vec<DrawdownInput>,
}

#[derive(Deserialize)]
struct LoanInterestRequest {
    drawdown: Vec<DrawdownInput>,
    loan: ConstructionLoanInput,
}

/// Arguments for a drawdown schedule
#[derive(Args)]
pub struct DrawdownArgs {
    /// Path to JSON input file ({"currency": .., "periods": [..]})
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_drawdown(args: DrawdownArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: DrawdownRequest = input::require(args.input.as_deref(), "drawdown")?;
    let result = drawdown::simulate_drawdown(&request.periods, &request.currency)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for construction loan interest
#[derive(Args)]
pub struct LoanInterestArgs {
    /// Path to JSON input file ({"drawdown": [..], "loan": {..}})
    #[arg(long)]
    pub input: Option<String>,

    /// Override the accrual periods per year
    #[arg(long)]
    pub periods_per_year: Option<u32>,
}

pub fn run_loan_interest(
    args: LoanInterestArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: LoanInterestRequest =
        input::require(args.input.as_deref(), "loan interest")?;
    request.loan.periods_per_year = args
        .periods_per_year
        .or(request.loan.periods_per_year)
        .or(Some(config.default_periods_per_year));

    let schedule = drawdown::build_drawdown_schedule(&request.drawdown, &request.loan.currency);
    let result = interest::accrue_construction_interest(&schedule.entries, &request.loan)?;
    Ok(serde_json::to_value(result)?)
}
