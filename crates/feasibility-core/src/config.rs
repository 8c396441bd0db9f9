//! Engine configuration.
//!
//! Every field has a default so a partial YAML/JSON document is enough.
//! `FEAS_SYNC_THRESHOLD` overrides the synchronous sensitivity threshold.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::construction::interest::DEFAULT_PERIODS_PER_YEAR;
use crate::debt::dscr::DEFAULT_DSCR_COVENANT;
use crate::error::FeasibilityError;
use crate::FeasibilityResult;

pub const SYNC_THRESHOLD_ENV: &str = "FEAS_SYNC_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Band counts at or below this run inline; larger runs are queued
    pub sync_threshold: usize,
    pub queue_name: String,
    pub task_name: String,
    /// Minimum DSCR used for covenant breach counting
    pub dscr_covenant: Decimal,
    pub default_periods_per_year: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_threshold: 5,
            queue_name: "feasibility-sensitivity".into(),
            task_name: "feasibility.run_sensitivity".into(),
            dscr_covenant: DEFAULT_DSCR_COVENANT,
            default_periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

impl EngineConfig {
    /// Apply environment overrides on top of the loaded values.
    pub fn with_env_overrides(mut self) -> FeasibilityResult<Self> {
        if let Ok(raw) = std::env::var(SYNC_THRESHOLD_ENV) {
            self.sync_threshold = raw.trim().parse().map_err(|_| {
                FeasibilityError::invalid(
                    SYNC_THRESHOLD_ENV,
                    format!("expected a non-negative integer, got '{raw}'"),
                )
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> FeasibilityResult<()> {
        if self.queue_name.trim().is_empty() {
            return Err(FeasibilityError::invalid(
                "queue_name",
                "Queue name cannot be empty",
            ));
        }
        if self.task_name.trim().is_empty() {
            return Err(FeasibilityError::invalid(
                "task_name",
                "Task name cannot be empty",
            ));
        }
        if self.default_periods_per_year == 0 {
            return Err(FeasibilityError::invalid(
                "default_periods_per_year",
                "Periods per year must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"sync_threshold": 2}"#).unwrap();
        assert_eq!(config.sync_threshold, 2);
        assert_eq!(config.queue_name, "feasibility-sensitivity");
        assert_eq!(config.dscr_covenant, dec!(1.20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_queue_name_rejected() {
        let config = EngineConfig {
            queue_name: " ".into(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
