//! Structural validation of raw polygon coordinates

use geojson::PolygonType;

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// First error rendered as `location: reason`
    pub fn first_error(&self) -> Option<String> {
        self.errors.first().map(|e| format!("{}: {}", e.location, e.reason))
    }
}

/// Validate polygon rings before they become a field geometry.
///
/// Every ring must be non-empty and every position must carry at least two
/// finite components. Extra components (altitude) are allowed and ignored.
/// Vertex count and distinctness of the boundary are checked when the
/// [`FieldGeometry`](agrindex_core::models::FieldGeometry) is built.
pub fn validate_polygon_rings(rings: &PolygonType) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if rings.is_empty() {
        result.add_error("Polygon".to_string(), "Polygon must have at least one ring".to_string());
        return result;
    }

    for (r, ring) in rings.iter().enumerate() {
        if ring.is_empty() {
            result.add_error(format!("ring[{}]", r), "Ring has no positions".to_string());
            continue;
        }

        for (i, position) in ring.iter().enumerate() {
            if position.len() < 2 {
                result.add_error(
                    format!("ring[{}][{}]", r, i),
                    format!("Position needs x and y, found {} component(s)", position.len()),
                );
            } else if !position[0].is_finite() || !position[1].is_finite() {
                result
                    .add_error(format!("ring[{}][{}]", r, i), "Coordinates must be finite".to_string());
            }
        }
    }

    result
}
