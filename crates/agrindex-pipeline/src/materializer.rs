//! Raster Materializer: encode an index tile and upload it

use agrindex_core::error::{AgrindexError, Result};
use agrindex_raster::{encode_geotiff, IndexTile};
use agrindex_store::ObjectStorage;
use bytes::Bytes;
use std::sync::Arc;

use crate::working_set::WorkingSet;

pub struct RasterMaterializer<'a, S: ObjectStorage + ?Sized> {
    storage: &'a S,
    bucket: &'a str,
    working_set: Arc<WorkingSet>,
}

impl<'a, S: ObjectStorage + ?Sized> RasterMaterializer<'a, S> {
    pub fn new(storage: &'a S, bucket: &'a str, working_set: Arc<WorkingSet>) -> Self {
        Self { storage, bucket, working_set }
    }

    /// Write `tile` as a GeoTIFF with its nodata and compression profile and
    /// upload it under `key`. Neither step is retried here.
    #[tracing::instrument(skip(self, tile), fields(index = %tile.name, bucket = %self.bucket))]
    pub async fn materialize(&self, tile: IndexTile, key: &str) -> Result<String> {
        let working_set = Arc::clone(&self.working_set);
        let artifact_key = key.to_string();

        let body = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let encoded = encode_geotiff(&tile.tile, tile.profile.compression).map_err(|e| match e {
                AgrindexError::WriteError { reason, .. } => {
                    AgrindexError::WriteError { key: artifact_key.clone(), reason }
                }
                other => other,
            })?;
            working_set.keep(&WorkingSet::artifact_name(&tile.name, None, "index"), encoded)
        })
        .await
        .map_err(|e| AgrindexError::WriteError {
            key: key.to_string(),
            reason: format!("encode task aborted: {}", e),
        })??;

        tracing::debug!(bytes = body.len(), "Encoded index raster");
        self.storage.put_object(self.bucket, key, Bytes::from(body)).await?;
        tracing::info!(key, "Uploaded index raster");

        Ok(key.to_string())
    }
}
