//! HTTP band source

use agrindex_core::error::{AgrindexError, Result};
use agrindex_core::models::BandAsset;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::ports::BandSource;

/// Fetches whole band rasters over HTTP(S). Not retried here.
#[derive(Debug, Clone)]
pub struct HttpBandSource {
    client: reqwest::Client,
}

impl HttpBandSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            AgrindexError::BandFetchError {
                band: "*".to_string(),
                location: "http client".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            }
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BandSource for HttpBandSource {
    #[tracing::instrument(skip(self, asset), fields(href = %asset.href))]
    async fn fetch(&self, band: &str, asset: &BandAsset) -> Result<Bytes> {
        let fetch_error = |reason: String| AgrindexError::BandFetchError {
            band: band.to_string(),
            location: asset.href.clone(),
            reason,
        };

        let response = self
            .client
            .get(&asset.href)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        tracing::debug!(bytes = body.len(), "Fetched band");
        Ok(body)
    }
}
