use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::warn;

use super::bands::SensitivityOutcome;
use crate::FeasibilityResult;

/// Where evaluated outcomes are kept, keyed by scenario.
///
/// Writing a scenario replaces whatever was stored for it before.
pub trait SensitivityStore {
    /// Replace the outcomes for `scenario_id`, returning how many were discarded.
    fn replace(
        &self,
        scenario_id: &str,
        outcomes: &[SensitivityOutcome],
    ) -> FeasibilityResult<usize>;

    fn outcomes(&self, scenario_id: &str) -> Vec<SensitivityOutcome>;
}

#[derive(Debug, Default)]
pub struct InMemorySensitivityStore {
    scenarios: Mutex<BTreeMap<String, Vec<SensitivityOutcome>>>,
}

impl InMemorySensitivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensitivityStore for InMemorySensitivityStore {
    fn replace(
        &self,
        scenario_id: &str,
        outcomes: &[SensitivityOutcome],
    ) -> FeasibilityResult<usize> {
        let mut scenarios = self.scenarios.lock().unwrap_or_else(|e| e.into_inner());
        let previous = scenarios
            .insert(scenario_id.to_string(), outcomes.to_vec())
            .map(|old| old.len())
            .unwrap_or(0);
        if previous > 0 {
            warn!(
                event = "sensitivity.replaced",
                scenario_id = %scenario_id,
                discarded = previous,
                stored = outcomes.len(),
            );
        }
        Ok(previous)
    }

    fn outcomes(&self, scenario_id: &str) -> Vec<SensitivityOutcome> {
        self.scenarios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(scenario_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::bands::ScenarioLabel;
    use rust_decimal_macros::dec;

    fn outcome(parameter: &str) -> SensitivityOutcome {
        SensitivityOutcome {
            parameter: parameter.into(),
            scenario: ScenarioLabel::Base,
            delta: dec!(0),
            delta_label: "0%".into(),
            npv: dec!(100),
            irr: None,
            escalated_cost: dec!(50),
            total_interest: None,
            notes: None,
        }
    }

    #[test]
    fn test_rerun_replaces_not_appends() {
        let store = InMemorySensitivityStore::new();
        let first = store.replace("s1", &[outcome("rent"), outcome("cost")]).unwrap();
        assert_eq!(first, 0);
        assert_eq!(store.replace("s1", &[outcome("rent")]).unwrap(), 2);
        assert_eq!(store.outcomes("s1").len(), 1);
        assert!(store.outcomes("other").is_empty());
    }
}
