//! STAC item search adapter for the scene catalog port

use agrindex_core::error::{AgrindexError, Result};
use agrindex_core::models::{BandAsset, CatalogQuery, SceneMatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::ports::SceneCatalog;

/// One page of a STAC item search
#[derive(Debug, Deserialize)]
struct StacItemCollection {
    #[serde(default)]
    features: Vec<StacItem>,
}

#[derive(Debug, Deserialize)]
struct StacItem {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
    #[serde(default)]
    assets: HashMap<String, StacAsset>,
}

#[derive(Debug, Deserialize)]
struct StacAsset {
    href: String,
}

/// Client for a STAC API `POST /search` endpoint
#[derive(Debug, Clone)]
pub struct StacSceneCatalog {
    client: reqwest::Client,
    search_url: String,
}

impl StacSceneCatalog {
    /// Create a client for a search URL such as
    /// `https://earth-search.aws.element84.com/v1/search`
    pub fn new(search_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            AgrindexError::CatalogError { reason: format!("failed to build HTTP client: {}", e) }
        })?;

        Ok(Self { client, search_url: search_url.into() })
    }
}

#[async_trait]
impl SceneCatalog for StacSceneCatalog {
    #[tracing::instrument(skip(self, query), fields(datetime = %query.datetime))]
    async fn search(&self, query: &CatalogQuery) -> Result<Option<SceneMatch>> {
        let response = self
            .client
            .post(&self.search_url)
            .json(query)
            .send()
            .await
            .map_err(|e| AgrindexError::CatalogError {
                reason: format!("search request to {} failed: {}", self.search_url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgrindexError::CatalogError {
                reason: format!(
                    "search returned HTTP {}: {}",
                    status,
                    body.chars().take(500).collect::<String>()
                ),
            });
        }

        let page: StacItemCollection = response.json().await.map_err(|e| {
            AgrindexError::CatalogError { reason: format!("parsing search response: {}", e) }
        })?;

        tracing::debug!(matched = page.features.len(), "Catalog search returned");

        // The catalog orders by relevance; the first feature is the best match
        page.features.into_iter().next().map(scene_from_item).transpose()
    }
}

/// Interpret a STAC item as a scene match.
///
/// Projection comes from `proj:epsg` or `proj:code`, the sensing time from
/// `created` or `datetime`.
fn scene_from_item(item: StacItem) -> Result<SceneMatch> {
    let epsg = item_epsg(&item.properties).ok_or_else(|| AgrindexError::CatalogError {
        reason: format!("scene {} carries no projection code", item.id),
    })?;

    let sensed_at = ["created", "datetime"]
        .iter()
        .filter_map(|k| item.properties.get(*k).and_then(Value::as_str))
        .find_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| AgrindexError::CatalogError {
            reason: format!("scene {} carries no parseable sensing time", item.id),
        })?;

    let utm_zone = item.properties.get("mgrs:utm_zone").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let assets: BTreeMap<String, BandAsset> =
        item.assets.into_iter().map(|(band, asset)| (band, BandAsset::new(asset.href))).collect();

    Ok(SceneMatch { scene_id: item.id, epsg, utm_zone, sensed_at, assets })
}

fn item_epsg(properties: &HashMap<String, Value>) -> Option<u32> {
    if let Some(code) = properties.get("proj:epsg").and_then(Value::as_u64) {
        return u32::try_from(code).ok();
    }

    properties
        .get("proj:code")
        .and_then(Value::as_str)
        .and_then(|code| code.strip_prefix("EPSG:"))
        .and_then(|code| code.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(properties: Value) -> StacItem {
        serde_json::from_value(json!({
            "type": "Feature",
            "id": "S2B_43RDP_20240605_0_L2A",
            "properties": properties,
            "assets": {
                "red": {"href": "https://sentinel-cogs.s3.us-west-2.amazonaws.com/B04.tif", "roles": ["data"]},
                "nir": {"href": "https://sentinel-cogs.s3.us-west-2.amazonaws.com/B08.tif"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_scene_from_earth_search_item() {
        let scene = scene_from_item(item(json!({
            "datetime": "2024-06-05T05:46:12.024000Z",
            "created": "2024-06-05T09:12:48.431Z",
            "proj:epsg": 32643,
            "mgrs:utm_zone": 43
        })))
        .unwrap();

        assert_eq!(scene.epsg, 32643);
        assert_eq!(scene.utm_zone.as_deref(), Some("43"));
        assert_eq!(scene.sensed_at.to_rfc3339(), "2024-06-05T09:12:48.431+00:00");
        assert_eq!(scene.asset("red").unwrap().href, "https://sentinel-cogs.s3.us-west-2.amazonaws.com/B04.tif");
    }

    #[test]
    fn test_proj_code_and_datetime_fallbacks() {
        let scene = scene_from_item(item(json!({
            "datetime": "2024-06-05T05:46:12Z",
            "proj:code": "EPSG:32644"
        })))
        .unwrap();

        assert_eq!(scene.epsg, 32644);
        assert_eq!(scene.utm_zone, None);
        assert_eq!(scene.sensing_date().to_string(), "2024-06-05");
    }

    #[test]
    fn test_item_without_projection() {
        let err = scene_from_item(item(json!({"datetime": "2024-06-05T05:46:12Z"}))).unwrap_err();
        assert!(matches!(err, AgrindexError::CatalogError { .. }));
    }

    #[test]
    fn test_empty_collection_parses() {
        let page: StacItemCollection =
            serde_json::from_value(json!({"type": "FeatureCollection", "features": []})).unwrap();
        assert!(page.features.is_empty());
    }
}
