//! Orchestration Planner: wait duration, execution identity, workflow start

use agrindex_core::error::{AgrindexError, Result, WorkflowStartErrorKind};
use agrindex_core::models::{OrchestrationPlan, WorkflowInput, WorkflowPayload};
use agrindex_store::{ExecutionStatus, WorkflowEngine};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::models::ScheduleOutcome;

/// Whole seconds from the start (UTC midnight) of `sensing_date` to `now`.
///
/// This is deliberately not the time elapsed since the full sensing
/// timestamp: the time of day is dropped before subtracting, so a scene
/// sensed at 05:46 on the 5th counts from 00:00 on the 5th. Negative when
/// the sensing date lies in the future; not clamped.
pub fn compute_wait_seconds(now: DateTime<Utc>, sensing_date: NaiveDate) -> i64 {
    let sensed = sensing_date.and_time(NaiveTime::MIN).and_utc();
    (now - sensed).num_seconds()
}

/// Identity probed at `attempt`: `base`, then `base_1`, `base_2`, ...
fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, attempt)
    }
}

/// Probe `base`, `base_1`, `base_2`, ... and return the first identity the
/// workflow service does not know, giving up after `max_probes` probes.
pub async fn allocate_execution_id<W: WorkflowEngine + ?Sized>(
    engine: &W,
    base: &str,
    max_probes: u32,
) -> Result<String> {
    for attempt in 0..max_probes {
        let id = candidate(base, attempt);
        match engine.describe(&id).await? {
            ExecutionStatus::NotFound => {
                tracing::debug!(execution_id = %id, probe = attempt + 1, "Execution identity is free");
                return Ok(id);
            }
            ExecutionStatus::Exists => {
                tracing::debug!(execution_id = %id, probe = attempt + 1, "Execution identity taken");
            }
        }
    }

    Err(AgrindexError::ExecutionIdentityExhausted { base: base.to_string(), attempts: max_probes })
}

pub struct OrchestrationPlanner<'a, W: WorkflowEngine + ?Sized> {
    engine: &'a W,
    max_probe_attempts: u32,
    max_start_attempts: u32,
}

impl<'a, W: WorkflowEngine + ?Sized> OrchestrationPlanner<'a, W> {
    pub fn new(engine: &'a W, max_probe_attempts: u32, max_start_attempts: u32) -> Self {
        Self { engine, max_probe_attempts, max_start_attempts }
    }

    /// Resolve a free identity and the wait for the follow-up workflow
    pub async fn plan(
        &self,
        base_identity: &str,
        now: DateTime<Utc>,
        sensing_date: NaiveDate,
        input: WorkflowInput,
    ) -> Result<OrchestrationPlan> {
        let execution_id =
            allocate_execution_id(self.engine, base_identity, self.max_probe_attempts).await?;
        let wait_duration_seconds = compute_wait_seconds(now, sensing_date);

        Ok(OrchestrationPlan {
            base_identity: base_identity.to_string(),
            execution_id,
            wait_duration_seconds,
            payload: WorkflowPayload { input, wait_duration_seconds },
        })
    }

    /// Start the workflow for `plan`.
    ///
    /// A collision means the identity was taken after probing: probe again
    /// from the base and retry, up to the start attempt bound. A limit error
    /// ends scheduling without failing the run. Anything else is an error.
    pub async fn schedule(&self, mut plan: OrchestrationPlan) -> Result<ScheduleOutcome> {
        let mut attempt = 1;
        loop {
            match self.engine.start(&plan.execution_id, &plan.payload).await {
                Ok(()) => {
                    tracing::info!(
                        execution_id = %plan.execution_id,
                        wait_duration_seconds = plan.wait_duration_seconds,
                        "Scheduled follow-up workflow"
                    );
                    return Ok(ScheduleOutcome::Started { execution_id: plan.execution_id });
                }
                Err(AgrindexError::WorkflowStartError {
                    execution_id,
                    kind: WorkflowStartErrorKind::LimitExceeded,
                }) => {
                    tracing::warn!(%execution_id, "Workflow limit exceeded; follow-up not scheduled");
                    return Ok(ScheduleOutcome::LimitExceeded {
                        execution_id,
                        reason: WorkflowStartErrorKind::LimitExceeded.to_string(),
                    });
                }
                Err(AgrindexError::WorkflowStartError {
                    execution_id,
                    kind: WorkflowStartErrorKind::Collision,
                }) if attempt < self.max_start_attempts => {
                    tracing::warn!(%execution_id, attempt, "Execution identity collided; probing again");
                    plan.execution_id = allocate_execution_id(
                        self.engine,
                        &plan.base_identity,
                        self.max_probe_attempts,
                    )
                    .await?;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
