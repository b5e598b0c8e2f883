//! CRS Reprojector: geographic rings to a scene's projected CRS

use agrindex_core::error::{AgrindexError, Result};
use agrindex_core::models::{Position, ProjectedRing};
use proj::Proj;

/// Geographic CRS of inbound field boundaries
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";

/// A projection pipeline set up once and applied to every vertex of a run.
///
/// Axis order is longitude/x first on input and easting/x first on output.
pub struct Reprojector {
    proj: Proj,
    source: String,
    target: String,
    target_epsg: u32,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl Reprojector {
    /// Forward transform from WGS84 degrees into `EPSG:<epsg>`
    pub fn to_epsg(epsg: u32) -> Result<Self> {
        Self::between(GEOGRAPHIC_CRS, &format!("EPSG:{}", epsg), epsg)
    }

    /// Inverse transform from `EPSG:<epsg>` back to WGS84 degrees
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        Self::between(&format!("EPSG:{}", epsg), GEOGRAPHIC_CRS, 4326)
    }

    fn between(source: &str, target: &str, target_epsg: u32) -> Result<Self> {
        // new_known_crs normalizes both ends to x/y axis order
        let proj = Proj::new_known_crs(source, target, None).map_err(|e| {
            AgrindexError::ProjectionError {
                target: target.to_string(),
                reason: format!("Failed to create projection from {}: {}", source, e),
            }
        })?;

        Ok(Self {
            proj,
            source: source.to_string(),
            target: target.to_string(),
            target_epsg,
        })
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transform one position, rejecting non-finite output
    pub fn convert(&self, position: Position) -> Result<Position> {
        let (x, y) = self.proj.convert((position[0], position[1])).map_err(|e| {
            AgrindexError::ProjectionError {
                target: self.target.clone(),
                reason: format!("Projection of ({}, {}) failed: {}", position[0], position[1], e),
            }
        })?;

        if !x.is_finite() || !y.is_finite() {
            return Err(AgrindexError::ProjectionError {
                target: self.target.clone(),
                reason: format!(
                    "({}, {}) projected to a non-finite coordinate",
                    position[0], position[1]
                ),
            });
        }

        Ok([x, y])
    }

    /// Transform every vertex of a ring, preserving order and count
    pub fn project_ring(&self, ring: &[Position]) -> Result<ProjectedRing> {
        let coords = ring.iter().map(|p| self.convert(*p)).collect::<Result<Vec<_>>>()?;
        tracing::debug!(target_crs = %self.target, vertices = coords.len(), "Reprojected ring");
        Ok(ProjectedRing::new(self.target_epsg, coords))
    }
}

/// Reproject a geographic ring into `EPSG:<epsg>`
pub fn reproject_ring(ring: &[Position], epsg: u32) -> Result<ProjectedRing> {
    Reprojector::to_epsg(epsg)?.project_ring(ring)
}
