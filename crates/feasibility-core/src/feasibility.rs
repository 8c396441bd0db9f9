//! One-shot feasibility run: every supplied block is computed by its own
//! component and merged into a single result record.

use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::asset_mix::{analyze_asset_mix, AssetFinanceInput, AssetMixOutput};
use crate::config::EngineConfig;
use crate::construction::drawdown::{simulate_drawdown, DrawdownInput, DrawdownSchedule};
use crate::construction::interest::{
    accrue_construction_interest, ConstructionLoanInput, ConstructionLoanInterestSchedule,
};
use crate::debt::capital_stack::{summarize_capital_stack, CapitalStackInput, CapitalStackSummary};
use crate::debt::dscr::{analyze_dscr, DscrInput, DscrOutput};
use crate::escalation::{resolve_escalation, CostEscalationInput, EscalationOutcome};
use crate::sensitivity::{
    dispatch_sensitivity, JobDispatcher, SensitivityBand, SensitivityBaseline,
    SensitivityJobContext, SensitivityRun, SensitivityStore,
};
use crate::time_value::{analyze_cash_flows, CashFlowMetrics};
use crate::types::{with_metadata, CashFlowSeries, ComputationOutput, Currency, Money, Rate};
use crate::FeasibilityResult;

/// Scenario id used for sensitivity storage when the request has none.
pub const DEFAULT_SCENARIO_ID: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub currency: Currency,
    pub cost_escalation: CostEscalationInput,
    pub cash_flows: CashFlowSeries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dscr: Option<DscrInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_stack: Option<CapitalStackInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawdown: Option<Vec<DrawdownInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction_loan: Option<ConstructionLoanInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_mix: Option<Vec<AssetFinanceInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_bands: Option<Vec<SensitivityBand>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityOutput {
    pub scenario_id: String,
    pub currency: String,
    pub escalation: EscalationOutcome,
    pub escalated_cost: Money,
    pub npv: Money,
    /// Omitted when the cash flows have no IRR
    pub irr: Option<Rate>,
    pub payback_periods: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscr: Option<DscrOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_stack: Option<CapitalStackSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawdown: Option<DrawdownSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction_interest: Option<ConstructionLoanInterestSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_mix: Option<AssetMixOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityRun>,
}

/// Run every supplied block of a feasibility request.
///
/// A missing IRR is downgraded to a warning; every other error fails
/// the run.
pub fn run_feasibility(
    input: &FeasibilityInput,
    config: &EngineConfig,
    dispatcher: &dyn JobDispatcher,
    store: &dyn SensitivityStore,
) -> FeasibilityResult<ComputationOutput<FeasibilityOutput>> {
    let start = Instant::now();
    let scenario_id = input
        .scenario_id
        .clone()
        .unwrap_or_else(|| DEFAULT_SCENARIO_ID.to_string());
    let _span = info_span!("feasibility.run", scenario_id = %scenario_id).entered();
    let mut warnings: Vec<String> = Vec::new();

    // --- Cost escalation ---
    let escalation = resolve_escalation(&input.cost_escalation)?;
    if !escalation.is_escalated() {
        warnings.push("Cost escalation fell back to the unescalated amount".into());
    }
    let escalated_cost = escalation.value();

    // --- Time value ---
    let flows = &input.cash_flows.flows;
    let cash_flow_metrics = analyze_cash_flows(&input.cash_flows)?;
    warnings.extend(cash_flow_metrics.warnings);
    let CashFlowMetrics {
        npv,
        irr,
        payback_period: payback_periods,
        ..
    } = cash_flow_metrics.result;

    // --- Debt ---
    let dscr = input
        .dscr
        .as_ref()
        .map(|d| analyze_dscr(d, config.dscr_covenant))
        .transpose()?
        .map(|out| {
            warnings.extend(out.warnings);
            out.result
        });

    let capital_stack = input
        .capital_stack
        .as_ref()
        .map(summarize_capital_stack)
        .transpose()?
        .map(|out| {
            warnings.extend(out.warnings);
            out.result
        });

    // --- Construction ---
    let drawdown = input
        .drawdown
        .as_ref()
        .map(|periods| simulate_drawdown(periods, &input.currency))
        .transpose()?
        .map(|out| {
            warnings.extend(out.warnings);
            out.result
        });

    let loan = input.construction_loan.clone().map(|mut loan| {
        loan.periods_per_year = loan.periods_per_year.or(Some(config.default_periods_per_year));
        loan
    });
    let drawdown_entries = drawdown
        .as_ref()
        .map(|d| d.entries.clone())
        .unwrap_or_default();
    let construction_interest = loan
        .as_ref()
        .map(|l| accrue_construction_interest(&drawdown_entries, l))
        .transpose()?
        .map(|out| {
            warnings.extend(out.warnings);
            out.result
        });

    // --- Asset mix ---
    let asset_mix = input
        .asset_mix
        .as_ref()
        .map(|assets| analyze_asset_mix(assets))
        .transpose()?
        .map(|out| {
            warnings.extend(out.warnings);
            out.result
        });

    // --- Sensitivity ---
    let sensitivity = match &input.sensitivity_bands {
        Some(bands) => {
            let baseline = SensitivityBaseline {
                escalated_cost,
                npv,
                irr,
                total_interest: construction_interest.as_ref().map(|i| i.total_interest),
            };
            let context = SensitivityJobContext {
                cash_flows: flows.clone(),
                discount_rate: input.cash_flows.discount_rate,
                escalated_cost,
                currency: input.currency.clone(),
                loan: loan.clone(),
                drawdown_schedule: drawdown_entries.clone(),
            };
            Some(dispatch_sensitivity(
                &scenario_id,
                bands,
                &baseline,
                context,
                config,
                dispatcher,
                store,
            )?)
        }
        None => None,
    };

    debug!(
        npv = %npv,
        irr = ?irr,
        escalated = escalation.is_escalated(),
        "feasibility run complete"
    );

    let output = FeasibilityOutput {
        scenario_id,
        currency: input.currency.code().to_string(),
        escalation,
        escalated_cost,
        npv,
        irr,
        payback_periods,
        dscr,
        capital_stack,
        drawdown,
        construction_interest,
        asset_mix,
        sensitivity,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Real-Estate Development Feasibility",
        &serde_json::json!({
            "discount_rate": input.cash_flows.discount_rate.to_string(),
            "periods": flows.len(),
            "sync_threshold": config.sync_threshold,
            "blocks": {
                "dscr": input.dscr.is_some(),
                "capital_stack": input.capital_stack.is_some(),
                "drawdown": input.drawdown.is_some(),
                "construction_loan": input.construction_loan.is_some(),
                "asset_mix": input.asset_mix.is_some(),
                "sensitivity": input.sensitivity_bands.is_some(),
            },
        }),
        warnings,
        elapsed,
        output,
    ))
}
