//! Catalog query and scene match value objects

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AgrindexError, Result};
use crate::models::field::BoundingBox;

/// Body of a catalog item search.
///
/// Serialized verbatim into the follow-up workflow payload, so the field
/// names are the catalog's wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub bbox: [f64; 4],
    pub collections: Vec<String>,
    pub datetime: String,
    pub limit: u32,
}

impl CatalogQuery {
    /// Query the `lookback_days` ending at `now` over the given extent
    pub fn for_window(
        bbox: &BoundingBox,
        collections: &[String],
        now: DateTime<Utc>,
        lookback_days: u32,
        limit: u32,
    ) -> Self {
        let start = now - Duration::days(i64::from(lookback_days));
        Self {
            bbox: bbox.to_array(),
            collections: collections.to_vec(),
            datetime: format!(
                "{}/{}",
                start.format("%Y-%m-%dT%H:%M:%SZ"),
                now.format("%Y-%m-%dT%H:%M:%SZ")
            ),
            limit,
        }
    }
}

/// Fetchable location of one band of a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandAsset {
    pub href: String,
}

impl BandAsset {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

/// Best-matching scene for a field and time window
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMatch {
    pub scene_id: String,
    pub epsg: u32,
    /// Informational only
    pub utm_zone: Option<String>,
    pub sensed_at: DateTime<Utc>,
    pub assets: BTreeMap<String, BandAsset>,
}

impl SceneMatch {
    /// `EPSG:<code>` form of the scene projection
    pub fn crs_code(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    /// UTC calendar date of the sensing timestamp
    pub fn sensing_date(&self) -> NaiveDate {
        self.sensed_at.date_naive()
    }

    /// Look up the asset for a band
    pub fn asset(&self, band: &str) -> Result<&BandAsset> {
        self.assets.get(band).ok_or_else(|| AgrindexError::BandFetchError {
            band: band.to_string(),
            location: self.scene_id.clone(),
            reason: "scene has no asset for this band".to_string(),
        })
    }
}
