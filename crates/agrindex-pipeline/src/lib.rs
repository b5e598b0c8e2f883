//! Agrindex Pipeline - One run from a field-boundary document to index rasters
//! and a scheduled follow-up workflow
//!
//! Stages are wired through the collaborator ports of `agrindex-store`, so
//! every run can be exercised against the in-memory doubles.

pub mod clipper;
pub mod materializer;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod working_set;

pub use clipper::BandClipper;
pub use materializer::RasterMaterializer;
pub use models::{PipelineSettings, RunOutcome, ScheduleOutcome};
pub use pipeline::FieldIndexPipeline;
pub use planner::{allocate_execution_id, compute_wait_seconds, OrchestrationPlanner};
pub use working_set::WorkingSet;
