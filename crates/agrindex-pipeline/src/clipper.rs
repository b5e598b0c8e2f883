//! Band Clipper: fetch one band and mask it to the projected field

use agrindex_core::error::{AgrindexError, Result};
use agrindex_core::models::{BandAsset, ProjectedRing};
use agrindex_geo::models::projected_polygon;
use agrindex_raster::{decode_geotiff, encode_geotiff, mask_to_polygon, BandTile, Compression};
use agrindex_store::BandSource;
use std::sync::Arc;

use crate::working_set::WorkingSet;

/// Clips bands for one run. Fetching is async; decoding and masking run on a
/// blocking thread.
pub struct BandClipper<'a, B: BandSource + ?Sized> {
    source: &'a B,
    working_set: Arc<WorkingSet>,
    nodata: u16,
}

impl<'a, B: BandSource + ?Sized> BandClipper<'a, B> {
    pub fn new(source: &'a B, working_set: Arc<WorkingSet>, nodata: u16) -> Self {
        Self { source, working_set, nodata }
    }

    /// Fetch `band` and return it masked and cropped to `ring`, with nodata
    /// fixed at the clipper's sentinel.
    #[tracing::instrument(skip(self, asset, ring), fields(href = %asset.href))]
    pub async fn clip(
        &self,
        index: &str,
        band: &str,
        asset: &BandAsset,
        ring: Arc<ProjectedRing>,
    ) -> Result<BandTile> {
        let fetched = self.source.fetch(band, asset).await?;
        tracing::debug!(bytes = fetched.len(), "Fetched band");

        let working_set = Arc::clone(&self.working_set);
        let index = index.to_string();
        let band = band.to_string();
        let nodata = self.nodata;

        tokio::task::spawn_blocking(move || {
            clip_blocking(&working_set, &index, &band, fetched.to_vec(), &ring, nodata)
        })
        .await
        .map_err(|e| AgrindexError::RasterDecode { reason: format!("clip task aborted: {}", e) })?
    }
}

fn clip_blocking(
    working_set: &WorkingSet,
    index: &str,
    band: &str,
    fetched: Vec<u8>,
    ring: &ProjectedRing,
    nodata: u16,
) -> Result<BandTile> {
    let source = working_set.keep(&WorkingSet::artifact_name(index, Some(band), "source"), fetched)?;
    let tile = decode_geotiff::<u16>(&source)?;

    let clipped = mask_to_polygon(&tile, &projected_polygon(ring), ring.epsg(), band, nodata)?;
    tracing::info!(
        index,
        band,
        rows = clipped.rows(),
        cols = clipped.cols(),
        valid = clipped.valid_count(),
        "Clipped band"
    );

    if working_set.path().is_none() {
        return Ok(clipped);
    }

    // The index engine reads the clipped raster back from the working set
    let encoded = encode_geotiff(&clipped, Compression::Lzw)?;
    let persisted = working_set.keep(&WorkingSet::artifact_name(index, Some(band), "clip"), encoded)?;
    decode_geotiff::<u16>(&persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrindex_core::config::WorkingSetStrategy;
    use agrindex_raster::GeoTransform;
    use agrindex_store::memory::MemoryBandSource;

    const HREF: &str = "https://sentinel-cogs.example/B04.tif";

    fn source_with_band() -> MemoryBandSource {
        let tile = BandTile::from_vec(
            (1..=100).collect(),
            10,
            10,
            GeoTransform::new(500_000.0, 3_200_000.0, 10.0, -10.0),
            32643,
            Some(0),
        )
        .unwrap();
        let source = MemoryBandSource::new();
        source.insert(HREF, encode_geotiff(&tile, Compression::Lzw).unwrap());
        source
    }

    fn square(x0: f64, y0: f64, size: f64) -> Arc<ProjectedRing> {
        Arc::new(ProjectedRing::new(
            32643,
            vec![[x0, y0], [x0 + size, y0], [x0 + size, y0 - size], [x0, y0 - size]],
        ))
    }

    #[tokio::test]
    async fn test_clip_crops_to_ring() {
        let source = source_with_band();
        let clipper = BandClipper::new(&source, Arc::new(WorkingSet::in_memory()), 0);

        let clipped = clipper
            .clip("NDVI", "red", &BandAsset::new(HREF), square(500_021.0, 3_199_979.0, 28.0))
            .await
            .unwrap();

        // Columns 2..5 and rows 2..5 are touched by the square
        assert_eq!(clipped.shape(), (3, 3));
        assert_eq!(clipped.nodata(), Some(0));
        assert_eq!(clipped.transform().origin_x, 500_020.0);
        assert_eq!(source.fetches(), vec!["red".to_string()]);
    }

    #[tokio::test]
    async fn test_disk_working_set_round_trips_clip() {
        let source = source_with_band();
        let working_set = Arc::new(WorkingSet::new(WorkingSetStrategy::Disk).unwrap());
        let clipper = BandClipper::new(&source, Arc::clone(&working_set), 0);

        let clipped = clipper
            .clip("NDVI", "nir", &BandAsset::new(HREF), square(500_021.0, 3_199_979.0, 28.0))
            .await
            .unwrap();

        assert_eq!(clipped.shape(), (3, 3));
        let dir = working_set.path().unwrap();
        assert!(dir.join("NDVI_nir_source.tif").exists());
        assert!(dir.join("NDVI_nir_clip.tif").exists());
    }

    #[tokio::test]
    async fn test_ring_outside_scene_is_empty_clip() {
        let source = source_with_band();
        let clipper = BandClipper::new(&source, Arc::new(WorkingSet::in_memory()), 0);

        let err = clipper
            .clip("NDVI", "red", &BandAsset::new(HREF), square(600_000.0, 3_100_000.0, 50.0))
            .await
            .unwrap_err();

        assert!(matches!(err, AgrindexError::EmptyClipError { ref band } if band == "red"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_distinct() {
        let source = MemoryBandSource::new();
        let clipper = BandClipper::new(&source, Arc::new(WorkingSet::in_memory()), 0);

        let err = clipper
            .clip("NDVI", "red", &BandAsset::new(HREF), square(500_021.0, 3_199_979.0, 28.0))
            .await
            .unwrap_err();

        assert!(matches!(err, AgrindexError::BandFetchError { .. }));
        assert!(err.is_retryable());
    }
}
