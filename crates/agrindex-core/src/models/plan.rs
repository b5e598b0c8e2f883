//! Follow-up workflow payload and orchestration plan

use serde::{Deserialize, Serialize};

use crate::models::field::Position;
use crate::models::scene::CatalogQuery;

/// Input bundle handed to the follow-up workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Field boundary in geographic coordinates
    #[serde(rename = "coords")]
    pub ring: Vec<Position>,
    #[serde(rename = "payload")]
    pub catalog_query: CatalogQuery,
    #[serde(rename = "key")]
    pub source_key: String,
}

/// Document passed to the workflow start call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPayload {
    #[serde(rename = "input_data")]
    pub input: WorkflowInput,
    /// Seconds between the scene's sensing date and the planning time; may be
    /// zero or negative
    pub wait_duration_seconds: i64,
}

/// A resolved plan for starting the follow-up workflow
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationPlan {
    pub base_identity: String,
    pub execution_id: String,
    pub wait_duration_seconds: i64,
    pub payload: WorkflowPayload,
}
