//! Conversions between field rings and the `geo` crate.
//!
//! Re-exports the canonical ring types from `agrindex-core`.

use geo::{Coord, LineString, Polygon};

pub use agrindex_core::models::{BoundingBox, FieldGeometry, Position, ProjectedRing};

/// Build a hole-free polygon from a ring. The ring is closed if needed.
pub fn ring_to_polygon(ring: &[Position]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
    // LineString -> Polygon closes the exterior
    Polygon::new(LineString::new(coords), vec![])
}

/// The projected field boundary as a polygon in scene coordinates
pub fn projected_polygon(ring: &ProjectedRing) -> Polygon<f64> {
    ring_to_polygon(ring.coords())
}
