use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::bands::{
    evaluate_bands, validate_bands, SensitivityBand, SensitivityBaseline, SensitivityOutcome,
};
use super::store::SensitivityStore;
use crate::config::EngineConfig;
use crate::construction::drawdown::DrawdownEntry;
use crate::construction::interest::{schedule_interest, ConstructionLoanInput};
use crate::error::FeasibilityError;
use crate::time_value;
use crate::types::{Currency, Money, Rate};
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// How a sensitivity run was executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDispatch {
    pub task_id: Option<String>,
    pub status: JobStatus,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
}

/// Everything a worker needs to rebuild the baseline for a queued run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityJobContext {
    pub cash_flows: Vec<Money>,
    pub discount_rate: Rate,
    pub escalated_cost: Money,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan: Option<ConstructionLoanInput>,
    #[serde(default)]
    pub drawdown_schedule: Vec<DrawdownEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub task_name: String,
    pub scenario_id: String,
    pub bands: Vec<SensitivityBand>,
    pub context: SensitivityJobContext,
    pub queue_name: String,
}

/// A queued request as written to the spool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub task_id: String,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub request: JobRequest,
}

impl JobEnvelope {
    pub fn load(path: &Path) -> FeasibilityResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            FeasibilityError::Dispatch(format!("failed to read '{}': {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Result of a dispatch decision. `outcomes` is only set for inline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityRun {
    pub job: JobDispatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<Vec<SensitivityOutcome>>,
}

// ---------------------------------------------------------------------------
// Dispatchers
// ---------------------------------------------------------------------------

/// Hands a sensitivity job to an out-of-process queue.
pub trait JobDispatcher {
    fn backend(&self) -> &str;

    /// Enqueue without waiting for execution.
    fn enqueue(&self, request: &JobRequest) -> FeasibilityResult<JobDispatch>;
}

/// Writes one JSON envelope per task to `<root>/<queue_name>/<task_id>.json`
/// for a worker to pick up.
#[derive(Debug, Clone)]
pub struct SpoolDispatcher {
    root: PathBuf,
}

impl SpoolDispatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn queue_dir(&self, queue_name: &str) -> PathBuf {
        self.root.join(queue_name)
    }
}

impl JobDispatcher for SpoolDispatcher {
    fn backend(&self) -> &str {
        "spool"
    }

    fn enqueue(&self, request: &JobRequest) -> FeasibilityResult<JobDispatch> {
        let envelope = JobEnvelope {
            task_id: Uuid::new_v4().to_string(),
            queued_at: Utc::now(),
            request: request.clone(),
        };

        let dir = self.queue_dir(&request.queue_name);
        fs::create_dir_all(&dir).map_err(|e| {
            FeasibilityError::Dispatch(format!("failed to create '{}': {e}", dir.display()))
        })?;

        // Write then rename so a worker never sees a half-written file
        let path = dir.join(format!("{}.json", envelope.task_id));
        let partial = dir.join(format!("{}.json.partial", envelope.task_id));
        let body = serde_json::to_vec_pretty(&envelope)?;
        write_then_rename(&partial, &path, &body).map_err(|e| {
            FeasibilityError::Dispatch(format!("failed to spool '{}': {e}", path.display()))
        })?;

        Ok(JobDispatch {
            task_id: Some(envelope.task_id),
            status: JobStatus::Queued,
            backend: self.backend().to_string(),
            queue: Some(request.queue_name.clone()),
            queued_at: Some(envelope.queued_at),
        })
    }
}

/// Write `body` to `partial` and move it into place. The partial file is
/// removed if either step fails.
fn write_then_rename(partial: &Path, path: &Path, body: &[u8]) -> std::io::Result<()> {
    let result = fs::write(partial, body).and_then(|_| fs::rename(partial, path));
    if result.is_err() {
        let _ = fs::remove_file(partial);
    }
    result
}

/// In-process dispatcher that records requests instead of queueing them.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<JobRequest>>,
    fail_with: Option<String>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose every enqueue fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn requests(&self) -> Vec<JobRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl JobDispatcher for RecordingDispatcher {
    fn backend(&self) -> &str {
        "recording"
    }

    fn enqueue(&self, request: &JobRequest) -> FeasibilityResult<JobDispatch> {
        if let Some(message) = &self.fail_with {
            return Err(FeasibilityError::Dispatch(message.clone()));
        }
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.push(request.clone());
        Ok(JobDispatch {
            task_id: Some(format!("recorded-{}", requests.len())),
            status: JobStatus::Queued,
            backend: self.backend().to_string(),
            queue: Some(request.queue_name.clone()),
            queued_at: Some(Utc::now()),
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch policy
// ---------------------------------------------------------------------------

/// Run sensitivity inline when the band count is at or below the
/// configured threshold, otherwise hand it to the job queue.
///
/// Inline results replace anything previously stored for the scenario.
pub fn dispatch_sensitivity(
    scenario_id: &str,
    bands: &[SensitivityBand],
    baseline: &SensitivityBaseline,
    context: SensitivityJobContext,
    config: &EngineConfig,
    dispatcher: &dyn JobDispatcher,
    store: &dyn SensitivityStore,
) -> FeasibilityResult<SensitivityRun> {
    validate_bands(bands)?;

    if bands.len() <= config.sync_threshold {
        let outcomes = evaluate_bands(bands, baseline)?;
        store.replace(scenario_id, &outcomes)?;
        info!(
            event = "sensitivity.completed_inline",
            scenario_id = %scenario_id,
            bands = bands.len(),
            outcomes = outcomes.len(),
        );
        return Ok(SensitivityRun {
            job: JobDispatch {
                task_id: None,
                status: JobStatus::Completed,
                backend: "inline".into(),
                queue: None,
                queued_at: None,
            },
            outcomes: Some(outcomes),
        });
    }

    let request = JobRequest {
        task_name: config.task_name.clone(),
        scenario_id: scenario_id.to_string(),
        bands: bands.to_vec(),
        context,
        queue_name: config.queue_name.clone(),
    };
    let job = dispatcher.enqueue(&request)?;
    info!(
        event = "sensitivity.dispatched",
        scenario_id = %scenario_id,
        bands = bands.len(),
        backend = %job.backend,
        task_id = ?job.task_id,
    );

    Ok(SensitivityRun {
        job,
        outcomes: None,
    })
}

/// Worker-side execution of a queued job: rebuild the baseline from the
/// job context, evaluate every band and store the outcomes.
pub fn run_sensitivity_job(
    envelope: &JobEnvelope,
    store: &dyn SensitivityStore,
) -> FeasibilityResult<Vec<SensitivityOutcome>> {
    let baseline = baseline_from_context(&envelope.request.context)?;
    let outcomes = evaluate_bands(&envelope.request.bands, &baseline)?;
    store.replace(&envelope.request.scenario_id, &outcomes)?;
    info!(
        event = "sensitivity.job_completed",
        task_id = %envelope.task_id,
        scenario_id = %envelope.request.scenario_id,
        outcomes = outcomes.len(),
    );
    Ok(outcomes)
}

pub fn baseline_from_context(
    context: &SensitivityJobContext,
) -> FeasibilityResult<SensitivityBaseline> {
    let npv = time_value::npv(context.discount_rate, &context.cash_flows)?;
    let irr = time_value::irr(&context.cash_flows).ok();
    let total_interest = context
        .loan
        .as_ref()
        .map(|loan| {
            schedule_interest(&context.drawdown_schedule, loan).map(|s| s.total_interest)
        })
        .transpose()?;

    Ok(SensitivityBaseline {
        escalated_cost: context.escalated_cost,
        npv,
        irr,
        total_interest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_rename_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("job.json.partial");
        let target = dir.path().join("job.json");
        // A non-empty directory at the target makes the rename fail
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();

        assert!(write_then_rename(&partial, &target, b"{}").is_err());
        assert!(!partial.exists());
    }

    #[test]
    fn test_successful_write_moves_partial_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("job.json.partial");
        let target = dir.path().join("job.json");

        write_then_rename(&partial, &target, b"{}").unwrap();
        assert!(!partial.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
    }
}
