//! Geometry Extractor: field-boundary document to [`FieldGeometry`]

use agrindex_core::error::{AgrindexError, Result};
use agrindex_core::models::{FieldGeometry, Position};
use geojson::PolygonType;
use serde::Deserialize;
use serde_json::Value;

use crate::validation::validate_polygon_rings;

#[derive(Debug, Deserialize)]
struct BoundaryDocument {
    geometry: Option<BoundaryGeometry>,
}

#[derive(Debug, Deserialize)]
struct BoundaryGeometry {
    #[serde(rename = "type")]
    kind: Option<String>,
    coordinates: Option<Value>,
}

/// Parse a GeoJSON-like document and extract its polygon.
///
/// The document must carry `geometry.coordinates` as a list of rings. A
/// `geometry.type` other than `Polygon` is rejected; a missing type is
/// accepted.
pub fn extract_field(document: &str) -> Result<FieldGeometry> {
    let value: Value = serde_json::from_str(document).map_err(|e| {
        AgrindexError::MalformedGeometry { reason: format!("document is not JSON: {}", e) }
    })?;
    extract_field_from_value(&value)
}

/// Extract a polygon from an already parsed document
pub fn extract_field_from_value(value: &Value) -> Result<FieldGeometry> {
    let document: BoundaryDocument =
        BoundaryDocument::deserialize(value).map_err(|e| AgrindexError::MalformedGeometry {
            reason: format!("unexpected document shape: {}", e),
        })?;

    let geometry = document.geometry.ok_or_else(|| AgrindexError::MalformedGeometry {
        reason: "document has no geometry".to_string(),
    })?;

    if let Some(kind) = geometry.kind.as_deref() {
        if kind != "Polygon" {
            return Err(AgrindexError::MalformedGeometry {
                reason: format!("expected a Polygon geometry, found {}", kind),
            });
        }
    }

    let coordinates = geometry.coordinates.ok_or_else(|| AgrindexError::MalformedGeometry {
        reason: "geometry has no coordinates".to_string(),
    })?;

    let rings: PolygonType =
        serde_json::from_value(coordinates).map_err(|e| AgrindexError::MalformedGeometry {
            reason: format!("coordinates are not a list of rings: {}", e),
        })?;

    let validation = validate_polygon_rings(&rings);
    if !validation.is_valid {
        return Err(AgrindexError::MalformedGeometry {
            reason: validation.first_error().unwrap_or_else(|| "invalid polygon".to_string()),
        });
    }

    let rings: Vec<Vec<Position>> = rings
        .into_iter()
        .map(|ring| ring.into_iter().map(|p| [p[0], p[1]]).collect())
        .collect();

    let field = FieldGeometry::try_new(rings)?;
    tracing::debug!(
        rings = field.rings().len(),
        vertices = field.boundary().len(),
        "Extracted field geometry"
    );
    Ok(field)
}
