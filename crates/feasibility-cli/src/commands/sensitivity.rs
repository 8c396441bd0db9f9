use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};

use feasibility_core::sensitivity::{
    dispatch_sensitivity, run_sensitivity_job, JobEnvelope, SensitivityBand, SensitivityBaseline,
    SensitivityJobContext,
};

use super::Runtime;
use crate::input;

#[derive(Deserialize)]
struct SensitivityRequest {
    scenario_id: String,
    bands: Vec<SensitivityBand>,
    baseline: SensitivityBaseline,
    context: SensitivityJobContext,
}

/// Arguments for sensitivity dispatch
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON input file ({"scenario_id", "bands", "baseline", "context"})
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_sensitivity(
    args: SensitivityArgs,
    runtime: &Runtime,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: SensitivityRequest = input::require(args.input.as_deref(), "sensitivity")?;
    let run = dispatch_sensitivity(
        &request.scenario_id,
        &request.bands,
        &request.baseline,
        request.context,
        &runtime.config,
        &runtime.dispatcher,
        &runtime.store,
    )?;
    Ok(json!({ "result": run }))
}

/// Arguments for executing a spooled sensitivity job
#[derive(Args)]
pub struct RunJobArgs {
    /// Path to a spooled job envelope
    #[arg(long)]
    pub job: String,
}

pub fn run_job(args: RunJobArgs, runtime: &Runtime) -> Result<Value, Box<dyn std::error::Error>> {
    let path = input::file::resolve_path(&args.job)?;
    let envelope = JobEnvelope::load(&path)?;
    let outcomes = run_sensitivity_job(&envelope, &runtime.store)?;
    Ok(json!({
        "result": {
            "task_id": envelope.task_id,
            "scenario_id": envelope.request.scenario_id,
            "outcomes": outcomes,
        }
    }))
}
