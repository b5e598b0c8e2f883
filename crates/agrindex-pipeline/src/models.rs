use agrindex_core::config::{LayeredConfig, WorkingSetStrategy};
use agrindex_core::models::IndexDefinition;
use serde::Serialize;

/// Resolved settings for a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub collections: Vec<String>,
    pub lookback_days: u32,
    pub result_limit: u32,
    pub output_bucket: String,
    pub max_probe_attempts: u32,
    pub max_start_attempts: u32,
    pub band_nodata: u16,
    pub index_nodata: f32,
    pub working_set: WorkingSetStrategy,
    pub indices: Vec<IndexDefinition>,
}

impl PipelineSettings {
    pub fn from_config(config: &LayeredConfig) -> Self {
        Self {
            collections: config.collections.value.clone(),
            lookback_days: config.lookback_days.value,
            result_limit: config.result_limit.value,
            output_bucket: config.output_bucket.value.clone(),
            max_probe_attempts: config.max_probe_attempts.value,
            max_start_attempts: config.max_start_attempts.value,
            band_nodata: config.band_nodata.value,
            index_nodata: config.index_nodata.value,
            working_set: config.working_set.value,
            indices: config.indices.value.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&LayeredConfig::with_defaults())
    }
}

/// How a run ended without error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every index was uploaded and the follow-up workflow was started
    Scheduled {
        uploaded: Vec<String>,
        execution_id: String,
        wait_duration_seconds: i64,
    },
    /// Every index was uploaded but the workflow service refused the start
    FollowUpNotScheduled {
        uploaded: Vec<String>,
        execution_id: String,
        reason: String,
    },
    /// The catalog had no scene for the window; a notification was attempted
    NoSceneFound { window: String },
}

impl RunOutcome {
    /// Object keys written by the run
    pub fn uploaded(&self) -> &[String] {
        match self {
            RunOutcome::Scheduled { uploaded, .. }
            | RunOutcome::FollowUpNotScheduled { uploaded, .. } => uploaded,
            RunOutcome::NoSceneFound { .. } => &[],
        }
    }
}

/// Result of handing a plan to the workflow service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Started { execution_id: String },
    LimitExceeded { execution_id: String, reason: String },
}
