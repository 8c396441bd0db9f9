pub mod bands;
pub mod dispatch;
pub mod store;

pub use bands::{
    evaluate_bands, ScenarioLabel, SensitivityBand, SensitivityBaseline, SensitivityOutcome,
};
pub use dispatch::{
    dispatch_sensitivity, run_sensitivity_job, JobDispatch, JobDispatcher, JobEnvelope,
    JobRequest, JobStatus, RecordingDispatcher, SensitivityJobContext, SensitivityRun,
    SpoolDispatcher,
};
pub use store::{InMemorySensitivityStore, SensitivityStore};
