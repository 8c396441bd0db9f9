use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use feasibility_core::time_value;
use feasibility_core::CashFlowSeries;

use crate::input;

/// Arguments shared by the cash-flow commands
#[derive(Args)]
pub struct CashFlowArgs {
    /// Path to JSON input file ({"discount_rate": .., "flows": [..]})
    #[arg(long)]
    pub input: Option<String>,

    /// Discount rate as a decimal (0.08 = 8%)
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,

    /// Periodic cash flows (comma-separated, e.g. "-1000,400,400,400")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,
}

fn read_series(args: CashFlowArgs) -> Result<CashFlowSeries, Box<dyn std::error::Error>> {
    if let Some(series) = input::load(args.input.as_deref())? {
        return Ok(series);
    }
    let flows = args
        .cash_flows
        .ok_or("--cash-flows is required (or provide --input)")?;
    Ok(CashFlowSeries {
        discount_rate: args.rate.unwrap_or(Decimal::ZERO),
        flows,
    })
}

pub fn run_npv(args: CashFlowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let series = read_series(args)?;
    let npv = time_value::npv(series.discount_rate, &series.flows)?;
    Ok(json!({ "result": { "npv": npv, "discount_rate": series.discount_rate } }))
}

pub fn run_irr(args: CashFlowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let series = read_series(args)?;
    let irr = time_value::irr(&series.flows)?;
    Ok(json!({ "result": { "irr": irr } }))
}

pub fn run_cash_flows(args: CashFlowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let series = read_series(args)?;
    let result = time_value::analyze_cash_flows(&series)?;
    Ok(serde_json::to_value(result)?)
}
