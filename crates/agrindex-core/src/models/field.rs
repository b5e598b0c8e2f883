//! Field boundary value objects.
//!
//! Coordinates are always stored x-first: longitude/latitude for geographic
//! rings, easting/northing for projected ones.

use crate::error::{AgrindexError, Result};
use serde::{Deserialize, Serialize};

/// A single coordinate pair, x first
pub type Position = [f64; 2];

/// Axis-aligned extent in the coordinate system of the positions it was built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Compute the extent of a set of positions by independent min/max per axis.
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_positions<'a, I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut iter = positions.into_iter();
        let first = iter.next()?;
        let init = Self {
            min_x: first[0],
            min_y: first[1],
            max_x: first[0],
            max_y: first[1],
        };

        Some(iter.fold(init, |bbox, p| Self {
            min_x: bbox.min_x.min(p[0]),
            min_y: bbox.min_y.min(p[1]),
            max_x: bbox.max_x.max(p[0]),
            max_y: bbox.max_y.max(p[1]),
        }))
    }

    /// Check whether a position lies inside or on the edge of the box
    pub fn contains(&self, p: &Position) -> bool {
        p[0] >= self.min_x && p[0] <= self.max_x && p[1] >= self.min_y && p[1] <= self.max_y
    }

    /// `[min_x, min_y, max_x, max_y]`, the order catalog queries expect
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// The field boundary extracted from an inbound document.
///
/// Holds every ring of the source polygon. Only the first ring is the field
/// boundary used for reprojection and masking; the bounding box spans all
/// rings. Holes are ignored for masking.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGeometry {
    rings: Vec<Vec<Position>>,
    bbox: BoundingBox,
}

impl FieldGeometry {
    /// Build a field geometry, enforcing that the outer ring has at least
    /// three distinct finite vertices.
    pub fn try_new(rings: Vec<Vec<Position>>) -> Result<Self> {
        let boundary = rings.first().ok_or_else(|| AgrindexError::MalformedGeometry {
            reason: "polygon has no rings".to_string(),
        })?;

        if let Some(i) = boundary.iter().position(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(AgrindexError::MalformedGeometry {
                reason: format!("boundary vertex {} is not finite", i),
            });
        }

        let distinct = count_distinct(boundary);
        if distinct < 3 {
            return Err(AgrindexError::MalformedGeometry {
                reason: format!("boundary ring needs at least 3 distinct vertices, found {}", distinct),
            });
        }

        let bbox = BoundingBox::from_positions(rings.iter().flatten()).ok_or_else(|| {
            AgrindexError::MalformedGeometry { reason: "polygon has no coordinates".to_string() }
        })?;

        Ok(Self { rings, bbox })
    }

    /// The outer ring, used as the field boundary
    pub fn boundary(&self) -> &[Position] {
        &self.rings[0]
    }

    /// All rings as extracted
    pub fn rings(&self) -> &[Vec<Position>] {
        &self.rings
    }

    /// Extent across all rings
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

fn count_distinct(ring: &[Position]) -> usize {
    let mut seen: Vec<Position> = Vec::with_capacity(ring.len());
    for p in ring {
        if !seen.iter().any(|q| q == p) {
            seen.push(*p);
        }
    }
    seen.len()
}

/// The field boundary reprojected into a scene's projection (meters).
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRing {
    epsg: u32,
    coords: Vec<Position>,
}

impl ProjectedRing {
    pub fn new(epsg: u32, coords: Vec<Position>) -> Self {
        Self { epsg, coords }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn coords(&self) -> &[Position] {
        &self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Extent of the ring in projected units
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_positions(&self.coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Position> {
        vec![[75.0, 29.0], [75.01, 29.0], [75.005, 29.01], [75.0, 29.0]]
    }

    #[test]
    fn test_bbox_from_positions() {
        let bbox = BoundingBox::from_positions(&triangle()).unwrap();
        assert_eq!(bbox.to_array(), [75.0, 29.0, 75.01, 29.01]);
        assert!(bbox.contains(&[75.005, 29.005]));
        assert!(!bbox.contains(&[74.9, 29.005]));
    }

    #[test]
    fn test_bbox_empty() {
        let empty: Vec<Position> = vec![];
        assert!(BoundingBox::from_positions(&empty).is_none());
    }

    #[test]
    fn test_field_geometry_spans_all_rings() {
        let outer = triangle();
        let hole = vec![[74.0, 28.0], [74.001, 28.0], [74.0, 28.001], [74.0, 28.0]];
        let field = FieldGeometry::try_new(vec![outer.clone(), hole]).unwrap();

        assert_eq!(field.boundary(), outer.as_slice());
        assert_eq!(field.bbox().min_x, 74.0);
        assert_eq!(field.bbox().max_x, 75.01);
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let ring = vec![[1.0, 1.0], [2.0, 2.0], [1.0, 1.0], [2.0, 2.0]];
        let err = FieldGeometry::try_new(vec![ring]).unwrap_err();
        assert!(matches!(err, AgrindexError::MalformedGeometry { .. }));
    }

    #[test]
    fn test_non_finite_vertex_rejected() {
        let ring = vec![[1.0, 1.0], [f64::NAN, 2.0], [3.0, 1.0]];
        assert!(FieldGeometry::try_new(vec![ring]).is_err());
    }

    #[test]
    fn test_no_rings_rejected() {
        assert!(FieldGeometry::try_new(vec![]).is_err());
    }
}
