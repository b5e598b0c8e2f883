//! Index definitions and per-index computation requests

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::field::ProjectedRing;
use crate::models::scene::SceneMatch;

/// A normalized-difference index `(B - A) / (B + A)` over two named bands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    /// Subtracted band
    pub band_a: String,
    /// Leading band
    pub band_b: String,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, band_a: impl Into<String>, band_b: impl Into<String>) -> Self {
        Self { name: name.into(), band_a: band_a.into(), band_b: band_b.into() }
    }

    /// Vegetation: (nir - red) / (nir + red)
    pub fn ndvi() -> Self {
        Self::new("NDVI", "red", "nir")
    }

    /// Moisture: (swir16 - nir08) / (swir16 + nir08)
    pub fn ndmi() -> Self {
        Self::new("NDMI", "nir08", "swir16")
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::ndvi(), Self::ndmi()]
    }

    /// Bands in formula order, A then B
    pub fn bands(&self) -> [&str; 2] {
        [&self.band_a, &self.band_b]
    }
}

/// Everything one index computation needs, threaded through clipping and
/// computation. Ring and scene are shared with the sibling requests of the run.
#[derive(Debug, Clone)]
pub struct IndexComputationRequest {
    pub index: IndexDefinition,
    pub file_stem: String,
    pub sensing_date: NaiveDate,
    pub ring: Arc<ProjectedRing>,
    pub scene: Arc<SceneMatch>,
}

impl IndexComputationRequest {
    /// `{stem}/{YYYY-MM-DD}_{index}.tif`
    pub fn destination_key(&self) -> String {
        format!(
            "{}/{}_{}.tif",
            self.file_stem,
            self.sensing_date.format("%Y-%m-%d"),
            self.index.name
        )
    }
}
