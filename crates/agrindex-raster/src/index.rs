//! Index Engine: normalized difference of two clipped bands

use agrindex_core::error::{AgrindexError, Result};
use ndarray::Zip;

use crate::geotiff::Compression;
use crate::tile::{BandTile, RasterProfile, RasterTile, SampleType};

/// A computed index and the profile it is written with
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTile {
    pub name: String,
    pub tile: RasterTile<f32>,
    pub profile: RasterProfile,
}

/// Compute `(B - A) / (B + A)` elementwise.
///
/// Both tiles must share dimensions and pixel grid; bands stored at
/// different native resolutions are rejected, not resampled. A pixel becomes `nodata`
/// when either input is nodata or when `B + A` is zero. The output keeps
/// band A's transform and CRS as single-band LZW float samples.
pub fn normalized_difference(
    index: &str,
    band_a: &BandTile,
    band_b: &BandTile,
    nodata: f32,
) -> Result<IndexTile> {
    if band_a.shape() != band_b.shape() {
        return Err(AgrindexError::ShapeMismatch {
            index: index.to_string(),
            a: band_a.shape(),
            b: band_b.shape(),
        });
    }

    if band_a.epsg() != band_b.epsg() {
        return Err(AgrindexError::ProjectionError {
            target: format!("EPSG:{}", band_a.epsg()),
            reason: format!("{} inputs are in EPSG:{} and EPSG:{}", index, band_a.epsg(), band_b.epsg()),
        });
    }

    if !band_a.transform().aligned_with(band_b.transform()) {
        return Err(AgrindexError::GridMismatch {
            index: index.to_string(),
            a: band_a.transform().to_string(),
            b: band_b.transform().to_string(),
        });
    }

    let data = Zip::from(band_a.data()).and(band_b.data()).map_collect(|&a, &b| {
        if band_a.is_nodata(a) || band_b.is_nodata(b) {
            return nodata;
        }
        let a = f32::from(a);
        let b = f32::from(b);
        let sum = a + b;
        if sum == 0.0 {
            nodata
        } else {
            (b - a) / sum
        }
    });

    let tile = RasterTile::new(data, *band_a.transform(), band_a.epsg(), Some(nodata));

    let profile = RasterProfile {
        sample_type: SampleType::Float32,
        band_count: 1,
        compression: Compression::Lzw,
        nodata: Some(f64::from(nodata)),
        ..band_a.profile(Compression::Lzw)
    };

    tracing::debug!(
        index,
        rows = tile.rows(),
        cols = tile.cols(),
        valid = tile.valid_count(),
        "Computed normalized difference"
    );

    Ok(IndexTile { name: index.to_string(), tile, profile })
}
