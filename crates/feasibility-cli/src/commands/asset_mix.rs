use clap::Args;
use serde_json::Value;

use feasibility_core::asset_mix::{self, AssetFinanceInput};

use crate::input;

/// Arguments for the asset-mix breakdown
#[derive(Args)]
pub struct AssetMixArgs {
    /// Path to JSON input file (array of asset types)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_asset_mix(args: AssetMixArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let assets: Vec<AssetFinanceInput> = input::require(args.input.as_deref(), "asset mix")?;
    let result = asset_mix::analyze_asset_mix(&assets)?;
    Ok(serde_json::to_value(result)?)
}
