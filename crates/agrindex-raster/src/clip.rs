//! Polygon masking and cropping of band tiles.
//!
//! A pixel is kept when the polygon touches any part of it, not only its
//! center, so narrow fields keep their boundary pixels. The output is
//! cropped to the pixel window covering the polygon's extent.

use agrindex_core::error::{AgrindexError, Result};
use geo::{BoundingRect, Coord, Intersects, Polygon, Rect};
use ndarray::Array2;

use crate::tile::BandTile;

/// Pixel window `[col_start, col_end) x [row_start, row_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    col_start: usize,
    col_end: usize,
    row_start: usize,
    row_end: usize,
}

impl Window {
    fn width(&self) -> usize {
        self.col_end - self.col_start
    }

    fn height(&self) -> usize {
        self.row_end - self.row_start
    }
}

/// Mask `tile` to `polygon` and crop to the polygon's extent.
///
/// `polygon` must be in the tile's CRS (`polygon_epsg`). Pixels outside the
/// polygon, and source nodata pixels, become `nodata`. Fails with
/// `EmptyClipError` when no pixel of the tile touches the polygon.
pub fn mask_to_polygon(
    tile: &BandTile,
    polygon: &Polygon<f64>,
    polygon_epsg: u32,
    band: &str,
    nodata: u16,
) -> Result<BandTile> {
    if polygon_epsg != tile.epsg() {
        return Err(AgrindexError::ProjectionError {
            target: format!("EPSG:{}", tile.epsg()),
            reason: format!(
                "band '{}' is in EPSG:{} but the field was projected to EPSG:{}",
                band,
                tile.epsg(),
                polygon_epsg
            ),
        });
    }

    let transform = tile.transform();
    if !transform.is_north_up() {
        return Err(AgrindexError::RasterDecode {
            reason: format!("band '{}' has a rotated or flipped transform", band),
        });
    }

    let empty = || AgrindexError::EmptyClipError { band: band.to_string() };

    let extent = polygon.bounding_rect().ok_or_else(empty)?;
    let window = pixel_window(tile, &extent).ok_or_else(empty)?;

    let source = tile.data();
    let mut kept = 0usize;
    let data = Array2::from_shape_fn((window.height(), window.width()), |(r, c)| {
        let row = window.row_start + r;
        let col = window.col_start + c;

        let (x0, y0) = transform.pixel_to_geo_corner(col, row);
        let (x1, y1) = transform.pixel_to_geo_corner(col + 1, row + 1);
        let pixel = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });

        let value = source[[row, col]];
        if tile.is_nodata(value) || !polygon.intersects(&pixel) {
            nodata
        } else {
            kept += 1;
            value
        }
    });

    if kept == 0 {
        return Err(empty());
    }

    tracing::debug!(
        band,
        rows = window.height(),
        cols = window.width(),
        kept,
        "Masked band to field"
    );

    Ok(BandTile::new(
        data,
        transform.window(window.col_start, window.row_start),
        tile.epsg(),
        Some(nodata),
    ))
}

/// Window of whole pixels covering `extent`, clamped to the tile
fn pixel_window(tile: &BandTile, extent: &Rect<f64>) -> Option<Window> {
    let transform = tile.transform();
    let (rows, cols) = tile.shape();

    // North-up: max y maps to the smallest row
    let (c0, r0) = transform.geo_to_pixel(extent.min().x, extent.max().y);
    let (c1, r1) = transform.geo_to_pixel(extent.max().x, extent.min().y);

    let span = |lo: f64, hi: f64, limit: usize| -> Option<(usize, usize)> {
        let start = lo.floor();
        // A zero-width extent still covers the pixel it falls in
        let end = if hi.ceil() > start { hi.ceil() } else { start + 1.0 };
        let start = start.max(0.0);
        let end = end.min(limit as f64);
        (start < end).then(|| (start as usize, end as usize))
    };

    let (col_start, col_end) = span(c0, c1, cols)?;
    let (row_start, row_end) = span(r0, r1, rows)?;
    Some(Window { col_start, col_end, row_start, row_end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotransform::GeoTransform;
    use geo::LineString;

    /// 10x10 band of 10 m pixels, values 1..=100
    fn band() -> BandTile {
        BandTile::from_vec(
            (1..=100).collect(),
            10,
            10,
            GeoTransform::new(1000.0, 2000.0, 10.0, -10.0),
            32643,
            Some(0),
        )
        .unwrap()
    }

    fn polygon(coords: &[(f64, f64)]) -> Polygon<f64> {
        Polygon::new(LineString::from(coords.to_vec()), vec![])
    }

    #[test]
    fn test_square_aligned_to_pixels() {
        // Covers pixels cols 2..4, rows 3..5
        let field = polygon(&[(1020.0, 1970.0), (1040.0, 1970.0), (1040.0, 1950.0), (1020.0, 1950.0)]);
        let clipped = mask_to_polygon(&band(), &field, 32643, "red", 0).unwrap();

        assert_eq!(clipped.shape(), (2, 2));
        assert_eq!(clipped.transform().origin_x, 1020.0);
        assert_eq!(clipped.transform().origin_y, 1970.0);
        assert_eq!(clipped.data()[[0, 0]], 33);
        assert_eq!(clipped.nodata(), Some(0));
    }

    #[test]
    fn test_small_field_keeps_touched_pixels() {
        // Triangle smaller than one pixel and not covering any pixel center
        let field = polygon(&[(1012.0, 1988.0), (1014.0, 1988.0), (1012.0, 1986.0)]);
        let clipped = mask_to_polygon(&band(), &field, 32643, "nir", 0).unwrap();

        assert_eq!(clipped.shape(), (1, 1));
        assert_eq!(clipped.data()[[0, 0]], 12);
    }

    #[test]
    fn test_triangle_masks_far_corner() {
        let field = polygon(&[(1000.0, 2000.0), (1030.0, 2000.0), (1000.0, 1970.0)]);
        let clipped = mask_to_polygon(&band(), &field, 32643, "red", 0).unwrap();

        assert_eq!(clipped.shape(), (3, 3));
        // The far corner lies beyond the hypotenuse
        assert_eq!(clipped.data()[[0, 0]], 1);
        assert_eq!(clipped.data()[[1, 1]], 12);
        assert_eq!(clipped.data()[[2, 2]], 0);
    }

    #[test]
    fn test_outside_is_empty_clip() {
        let field = polygon(&[(5000.0, 5000.0), (5010.0, 5000.0), (5010.0, 4990.0)]);
        let err = mask_to_polygon(&band(), &field, 32643, "swir16", 0).unwrap_err();
        assert!(matches!(err, AgrindexError::EmptyClipError { ref band } if band == "swir16"));
    }

    #[test]
    fn test_partial_overlap_is_clamped() {
        let field = polygon(&[(950.0, 2050.0), (1025.0, 2050.0), (1025.0, 1975.0), (950.0, 1975.0)]);
        let clipped = mask_to_polygon(&band(), &field, 32643, "red", 0).unwrap();

        assert_eq!(clipped.shape(), (3, 3));
        assert_eq!(clipped.transform().origin_x, 1000.0);
        assert_eq!(clipped.valid_count(), 9);
    }

    #[test]
    fn test_source_nodata_becomes_band_nodata() {
        let mut values: Vec<u16> = (1..=100).collect();
        values[0] = 7;
        let tile = BandTile::from_vec(
            values,
            10,
            10,
            GeoTransform::new(1000.0, 2000.0, 10.0, -10.0),
            32643,
            Some(7),
        )
        .unwrap();

        let field = polygon(&[(1001.0, 1999.0), (1019.0, 1999.0), (1019.0, 1981.0), (1001.0, 1981.0)]);
        let clipped = mask_to_polygon(&tile, &field, 32643, "red", 0).unwrap();

        assert_eq!(clipped.data()[[0, 0]], 0);
        assert_eq!(clipped.data()[[0, 1]], 2);
    }

    #[test]
    fn test_crs_mismatch_is_projection_error() {
        let field = polygon(&[(1001.0, 1999.0), (1019.0, 1999.0), (1019.0, 1981.0)]);
        let err = mask_to_polygon(&band(), &field, 32644, "red", 0).unwrap_err();
        assert!(matches!(err, AgrindexError::ProjectionError { .. }));
    }
}
