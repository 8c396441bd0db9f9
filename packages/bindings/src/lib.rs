use std::path::Path;

use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use feasibility_core::construction::drawdown::DrawdownInput;
use feasibility_core::construction::interest::ConstructionLoanInput;
use feasibility_core::sensitivity::{
    InMemorySensitivityStore, JobEnvelope, SensitivityBand, SensitivityBaseline,
    SensitivityJobContext, SpoolDispatcher,
};
use feasibility_core::{Currency, EngineConfig};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<T: serde::de::DeserializeOwned>(input_json: &str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

fn engine_config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    let config = match config_json {
        Some(raw) => parse::<EngineConfig>(&raw)?,
        None => EngineConfig::default(),
    };
    config.validate().map_err(to_napi_error)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Escalation & time value
// ---------------------------------------------------------------------------

#[napi]
pub fn escalate_cost(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::escalation::CostEscalationInput = parse(&input_json)?;
    let output = feasibility_core::escalation::escalate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_cash_flows(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::CashFlowSeries = parse(&input_json)?;
    let output =
        feasibility_core::time_value::analyze_cash_flows(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Debt
// ---------------------------------------------------------------------------

#[napi]
pub fn dscr_timeline(input_json: String, covenant: Option<String>) -> NapiResult<String> {
    let input: feasibility_core::debt::dscr::DscrInput = parse(&input_json)?;
    let covenant = match covenant {
        Some(raw) => raw.trim().parse::<Decimal>().map_err(to_napi_error)?,
        None => feasibility_core::debt::dscr::DEFAULT_DSCR_COVENANT,
    };
    let output =
        feasibility_core::debt::dscr::analyze_dscr(&input, covenant).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn capital_stack(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::debt::capital_stack::CapitalStackInput = parse(&input_json)?;
    let output = feasibility_core::debt::capital_stack::summarize_capital_stack(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

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

#[napi]
pub fn drawdown_schedule(input_json: String) -> NapiResult<String> {
    let input: DrawdownRequest = parse(&input_json)?;
    let output =
        feasibility_core::construction::drawdown::simulate_drawdown(&input.periods, &input.currency)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn construction_interest(input_json: String) -> NapiResult<String> {
    let input: LoanInterestRequest = parse(&input_json)?;
    let schedule = feasibility_core::construction::drawdown::build_drawdown_schedule(
        &input.drawdown,
        &input.loan.currency,
    );
    let output = feasibility_core::construction::interest::accrue_construction_interest(
        &schedule.entries,
        &input.loan,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Asset mix
// ---------------------------------------------------------------------------

#[napi]
pub fn asset_mix(input_json: String) -> NapiResult<String> {
    let input: Vec<feasibility_core::asset_mix::AssetFinanceInput> = parse(&input_json)?;
    let output = feasibility_core::asset_mix::analyze_asset_mix(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Sensitivity & feasibility
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SensitivityRequest {
    scenario_id: String,
    bands: Vec<SensitivityBand>,
    baseline: SensitivityBaseline,
    context: SensitivityJobContext,
}

/// Large band sets are spooled under `spool_dir` for a worker.
#[napi]
pub fn dispatch_sensitivity(
    input_json: String,
    spool_dir: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let input: SensitivityRequest = parse(&input_json)?;
    let config = engine_config(config_json)?;
    let run = feasibility_core::sensitivity::dispatch_sensitivity(
        &input.scenario_id,
        &input.bands,
        &input.baseline,
        input.context,
        &config,
        &SpoolDispatcher::new(spool_dir),
        &InMemorySensitivityStore::new(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&run).map_err(to_napi_error)
}

#[napi]
pub fn run_sensitivity_job(job_path: String) -> NapiResult<String> {
    let envelope = JobEnvelope::load(Path::new(&job_path)).map_err(to_napi_error)?;
    let outcomes = feasibility_core::sensitivity::run_sensitivity_job(
        &envelope,
        &InMemorySensitivityStore::new(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&outcomes).map_err(to_napi_error)
}

#[napi]
pub fn run_feasibility(
    input_json: String,
    spool_dir: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let input: feasibility_core::feasibility::FeasibilityInput = parse(&input_json)?;
    let config = engine_config(config_json)?;
    let output = feasibility_core::feasibility::run_feasibility(
        &input,
        &config,
        &SpoolDispatcher::new(spool_dir),
        &InMemorySensitivityStore::new(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
