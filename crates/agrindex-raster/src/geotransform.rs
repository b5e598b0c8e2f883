//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Map coordinates of a pixel's top-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64;
        let row_f = row as f64;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Fractional pixel coordinates of a map point; use `.floor()` for indices
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-10 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_height < 0.0
            && self.pixel_width > 0.0
    }

    /// The transform of a window starting at (`col_off`, `row_off`)
    pub fn window(&self, col_off: usize, row_off: usize) -> Self {
        let (origin_x, origin_y) = self.pixel_to_geo_corner(col_off, row_off);
        Self { origin_x, origin_y, ..*self }
    }

    /// Whether both transforms describe the same pixel grid
    pub fn aligned_with(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-6;
        (self.origin_x - other.origin_x).abs() < EPS
            && (self.origin_y - other.origin_y).abs() < EPS
            && (self.pixel_width - other.pixel_width).abs() < EPS
            && (self.pixel_height - other.pixel_height).abs() < EPS
            && (self.row_rotation - other.row_rotation).abs() < EPS
            && (self.col_rotation - other.col_rotation).abs() < EPS
    }
}

impl fmt::Display for GeoTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} px at ({}, {})",
            self.pixel_width,
            self.pixel_height.abs(),
            self.origin_x,
            self.origin_y
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_grid_round_trip() {
        let gt = GeoTransform::new(600_000.0, 3_300_000.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo_corner(3, 7);
        assert_eq!((x, y), (600_030.0, 3_299_930.0));

        let (col, row) = gt.geo_to_pixel(600_035.0, 3_299_925.0);
        assert_eq!((col.floor(), row.floor()), (3.0, 7.0));
        assert!(gt.is_north_up());
    }

    #[test]
    fn test_window_shifts_origin_only() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let win = gt.window(2, 5);

        assert_eq!(win.origin_x, 120.0);
        assert_eq!(win.origin_y, 150.0);
        assert_eq!(win.pixel_width, 10.0);
        assert_eq!(win.pixel_height, -10.0);
    }

    #[test]
    fn test_alignment() {
        let gt = GeoTransform::new(600_000.0, 3_300_000.0, 10.0, -10.0);

        assert!(gt.aligned_with(&GeoTransform::new(600_000.0, 3_300_000.0, 10.0, -10.0)));
        assert!(!gt.aligned_with(&GeoTransform::new(600_000.0, 3_300_000.0, 20.0, -20.0)));
        assert!(!gt.aligned_with(&gt.window(1, 0)));
        assert_eq!(gt.to_string(), "10x10 px at (600000, 3300000)");
    }

    #[test]
    fn test_degenerate_transform() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, 0.0);
        let (col, row) = gt.geo_to_pixel(1.0, 1.0);
        assert!(col.is_nan() && row.is_nan());
    }
}
