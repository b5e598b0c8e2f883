//! Agrindex Store - Ports and adapters for external collaborators
//!
//! The pipeline talks to the scene catalog, object storage, band hosting,
//! notification and workflow services only through the traits in [`ports`].
//! Adapters for STAC over HTTP and for AWS live next to in-memory doubles.

pub mod aws;
pub mod http;
pub mod memory;
pub mod ports;
pub mod stac;

pub use ports::{BandSource, ExecutionStatus, Notifier, ObjectStorage, SceneCatalog, WorkflowEngine};
