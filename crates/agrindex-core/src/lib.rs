//! Agrindex Core - Domain models, error taxonomy, and configuration
//!
//! This crate contains the value objects shared by every stage of the field
//! index pipeline, plus the layered configuration used to drive it.

pub mod config;
pub mod error;
pub mod models;

pub use error::{AgrindexError, Result, WorkflowStartErrorKind};
