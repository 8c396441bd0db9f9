use clap::Args;
use serde_json::Value;

use feasibility_core::feasibility::{run_feasibility, FeasibilityInput};

use super::Runtime;
use crate::input;

/// Arguments for a full feasibility run
#[derive(Args)]
pub struct FeasibilityArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the scenario id in the input
    #[arg(long)]
    pub scenario_id: Option<String>,
}

pub fn run(args: FeasibilityArgs, runtime: &Runtime) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: FeasibilityInput = input::require(args.input.as_deref(), "feasibility")?;
    if args.scenario_id.is_some() {
        request.scenario_id = args.scenario_id;
    }
    let result = run_feasibility(
        &request,
        &runtime.config,
        &runtime.dispatcher,
        &runtime.store,
    )?;
    Ok(serde_json::to_value(result)?)
}
