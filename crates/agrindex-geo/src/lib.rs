//! Agrindex Geo - Field geometry extraction and CRS reprojection
//!
//! This crate turns a field-boundary document into a validated
//! [`FieldGeometry`](agrindex_core::models::FieldGeometry) and reprojects its
//! boundary ring into a scene's projected CRS.

pub mod extract;
pub mod models;
pub mod transform;
pub mod validation;

pub use extract::{extract_field, extract_field_from_value};
pub use transform::Reprojector;
