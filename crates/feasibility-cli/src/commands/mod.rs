pub mod asset_mix;
pub mod cash_flows;
pub mod construction;
pub mod debt;
pub mod escalation;
pub mod feasibility;
pub mod sensitivity;

use std::path::PathBuf;

use feasibility_core::sensitivity::{InMemorySensitivityStore, SpoolDispatcher};
use feasibility_core::EngineConfig;

/// Shared state for commands that dispatch sensitivity work.
pub struct Runtime {
    pub config: EngineConfig,
    pub dispatcher: SpoolDispatcher,
    pub store: InMemorySensitivityStore,
}

impl Runtime {
    pub fn new(config: EngineConfig, spool_dir: PathBuf) -> Self {
        Self {
            config,
            dispatcher: SpoolDispatcher::new(spool_dir),
            store: InMemorySensitivityStore::new(),
        }
    }
}
