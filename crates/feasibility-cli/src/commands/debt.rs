use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use feasibility_core::debt::capital_stack::{self, CapitalStackInput};
use feasibility_core::debt::dscr::{self, DscrInput};
use feasibility_core::{Currency, EngineConfig};

use crate::input;

/// Arguments for a DSCR timeline
#[derive(Args)]
pub struct DscrArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Net operating income per period (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub noi: Option<Vec<Decimal>>,

    /// Debt service per period (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub debt_service: Option<Vec<Decimal>>,

    /// Covenant threshold; defaults to the configured covenant
    #[arg(long)]
    pub covenant: Option<Decimal>,
}

pub fn run_dscr(
    args: DscrArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: DscrInput = match input::load(args.input.as_deref())? {
        Some(request) => request,
        None => DscrInput {
            labels: None,
            noi: args.noi.ok_or("--noi is required (or provide --input)")?,
            debt_service: args
                .debt_service
                .ok_or("--debt-service is required (or provide --input)")?,
            currency: Currency::default(),
        },
    };

    let covenant = args.covenant.unwrap_or(config.dscr_covenant);
    let result = dscr::analyze_dscr(&request, covenant)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for capital stack allocation
#[derive(Args)]
pub struct CapitalStackArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the total development cost in the input
    #[arg(long)]
    pub total_development_cost: Option<Decimal>,

    /// Report slices in tranche order instead of input order
    #[arg(long)]
    pub by_tranche: bool,
}

pub fn run_capital_stack(args: CapitalStackArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: CapitalStackInput = input::require(args.input.as_deref(), "capital stack")?;
    if args.total_development_cost.is_some() {
        request.total_development_cost = args.total_development_cost;
    }
    let mut result = capital_stack::summarize_capital_stack(&request)?;
    if args.by_tranche {
        result.result.slices = result.result.by_tranche().into_iter().cloned().collect();
    }
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_capital_stack_by_tranche_reorders_slices() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"slices": [
                {{"name": "Equity", "source_type": "equity", "amount": "600"}},
                {{"name": "Mezz", "source_type": "mezzanine", "amount": "50", "tranche_order": 2}},
                {{"name": "Senior", "source_type": "senior_debt", "amount": "350", "tranche_order": 1}}
            ]}}"#
        )
        .unwrap();

        let args = CapitalStackArgs {
            input: file.path().to_str().map(String::from),
            total_development_cost: None,
            by_tranche: true,
        };
        let value = run_capital_stack(args).unwrap();
        let names: Vec<&str> = value["result"]["slices"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Senior", "Mezz", "Equity"]);
    }
}
