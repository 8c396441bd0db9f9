use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use feasibility_core::escalation::{self, CostEscalationInput, CostIndexPoint};

use crate::input;

/// Arguments for construction-cost escalation
#[derive(Args)]
pub struct EscalateArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Cost amount in base-period terms
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Base period label, e.g. 2023-Q1
    #[arg(long)]
    pub base_period: Option<String>,

    /// JSON file holding an array of index points
    #[arg(long)]
    pub indices: Option<String>,

    #[arg(long)]
    pub series: Option<String>,

    #[arg(long)]
    pub jurisdiction: Option<String>,

    #[arg(long)]
    pub provider: Option<String>,
}

pub fn run_escalate(args: EscalateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: CostEscalationInput = match input::load(args.input.as_deref())? {
        Some(request) => request,
        None => {
            let amount = args
                .amount
                .ok_or("--amount is required (or provide --input)")?;
            let base_period = args
                .base_period
                .ok_or("--base-period is required (or provide --input)")?;
            let indices: Vec<CostIndexPoint> = match args.indices {
                Some(ref path) => input::file::read_json(path)?,
                None => Vec::new(),
            };
            CostEscalationInput {
                amount,
                base_period,
                series: args.series,
                jurisdiction: args.jurisdiction,
                provider: args.provider,
                indices,
            }
        }
    };

    let result = escalation::escalate(&request)?;
    Ok(serde_json::to_value(result)?)
}
