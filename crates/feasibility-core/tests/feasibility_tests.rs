use feasibility_core::config::EngineConfig;
use feasibility_core::feasibility::{run_feasibility, FeasibilityInput};
use feasibility_core::sensitivity::{InMemorySensitivityStore, JobStatus, RecordingDispatcher};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::json;

fn request() -> serde_json::Value {
    json!({
        "scenario_id": "harbor-view",
        "currency": "USD",
        "cost_escalation": {
            "amount": "1000000",
            "base_period": "2023-Q1",
            "series": "residential",
            "indices": [
                {"series": "residential", "jurisdiction": "US-WA", "provider": "ENR", "period": "2023-Q1", "value": "100"},
                {"series": "residential", "jurisdiction": "US-WA", "provider": "ENR", "period": "2024-Q1", "value": "106"}
            ]
        },
        "cash_flows": {
            "discount_rate": "0.08",
            "flows": ["-1000", "400", "400", "400"]
        },
        "dscr": {
            "noi": ["120", "130"],
            "debt_service": ["100", "100"]
        },
        "capital_stack": {
            "slices": [
                {"name": "Sponsor", "source_type": "equity", "amount": "600"},
                {"name": "Bank", "source_type": "senior_loan", "amount": "400", "rate": "0.06"}
            ]
        },
        "drawdown": [
            {"period": "M1", "equity_draw": "600", "debt_draw": "0"},
            {"period": "M2", "debt_draw": "200"},
            {"period": "M3", "debt_draw": "200"}
        ],
        "construction_loan": {"base_rate": "0.12"},
        "asset_mix": [
            {"asset_type": "residential", "allocation_pct": "70", "area": "1000",
             "monthly_rent_per_area": "2", "vacancy_pct": "5", "opex_pct": "30", "capex": "100000"}
        ],
        "sensitivity_bands": [
            {"parameter": "rent", "low": "-10", "base": "0", "high": "10"}
        ]
    })
}

#[test]
fn test_full_request_runs_every_block() {
    let input: FeasibilityInput = serde_json::from_value(request()).unwrap();
    let dispatcher = RecordingDispatcher::new();
    let store = InMemorySensitivityStore::new();

    let out = run_feasibility(&input, &EngineConfig::default(), &dispatcher, &store).unwrap();
    let result = out.result;

    assert_eq!(result.scenario_id, "harbor-view");
    assert_eq!(result.escalated_cost, dec!(1060000.00));
    assert_eq!(result.irr, Some(dec!(0.0970)));
    assert!(result.dscr.is_some());
    assert_eq!(
        result.capital_stack.as_ref().map(|c| c.total.to_string()),
        Some("1000.00".to_string())
    );

    // Monthly accrual on average balances: (100 + 300) * 0.01
    let interest = result.construction_interest.unwrap();
    assert_eq!(interest.periods_per_year, 12);
    assert_eq!(interest.total_interest, dec!(4.00));

    let sensitivity = result.sensitivity.unwrap();
    assert_eq!(sensitivity.job.status, JobStatus::Completed);
    assert_eq!(store_len(&store, "harbor-view"), 3);
}

#[test]
fn test_missing_irr_becomes_warning() {
    let mut raw = request();
    raw["cash_flows"]["flows"] = json!(["100", "50", "25"]);
    raw.as_object_mut().unwrap().remove("sensitivity_bands");
    let input: FeasibilityInput = serde_json::from_value(raw).unwrap();

    let out = run_feasibility(
        &input,
        &EngineConfig::default(),
        &RecordingDispatcher::new(),
        &InMemorySensitivityStore::new(),
    )
    .unwrap();

    assert_eq!(out.result.irr, None);
    assert!(out.warnings.iter().any(|w| w.starts_with("IRR omitted")));
    assert!(out.result.sensitivity.is_none());
}

#[test]
fn test_scenario_id_defaults() {
    let mut raw = request();
    raw.as_object_mut().unwrap().remove("scenario_id");
    let input: FeasibilityInput = serde_json::from_value(raw).unwrap();
    let store = InMemorySensitivityStore::new();

    let out = run_feasibility(
        &input,
        &EngineConfig::default(),
        &RecordingDispatcher::new(),
        &store,
    )
    .unwrap();
    assert_eq!(out.result.scenario_id, "default");
    assert_eq!(store_len(&store, "default"), 3);
}

#[test]
fn test_construction_warnings_reach_the_envelope() {
    let mut raw = request();
    raw["drawdown"]
        .as_array_mut()
        .unwrap()
        .push(json!({"period": "M4", "debt_draw": "-50"}));
    raw["construction_loan"] = json!({
        "base_rate": "0.12",
        "facilities": [{"name": "Senior", "amount": "400", "rate": "0.05"}]
    });
    let input: FeasibilityInput = serde_json::from_value(raw).unwrap();

    let out = run_feasibility(
        &input,
        &EngineConfig::default(),
        &RecordingDispatcher::new(),
        &InMemorySensitivityStore::new(),
    )
    .unwrap();

    assert!(out
        .warnings
        .iter()
        .any(|w| w.starts_with("Negative draw in period 'M4'")));
    assert!(out
        .warnings
        .iter()
        .any(|w| w.starts_with("Facility interest 20.00 supersedes")));
    assert_eq!(
        out.result.construction_interest.map(|i| i.total_interest),
        Some(dec!(20.00))
    );
}

fn store_len(store: &InMemorySensitivityStore, scenario_id: &str) -> usize {
    use feasibility_core::sensitivity::SensitivityStore;
    store.outcomes(scenario_id).len()
}
