//! Mesh validation.

use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;

pub(crate) fn validate_grid(nx: usize, ny: usize, sx: f64, sy: f64) -> MeshResult<()> {
    if nx == 0 || ny == 0 {
        return Err(MeshError::EmptyGrid { nx, ny });
    }
    for (what, value) in [("sx", sx), ("sy", sy)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(MeshError::InvalidExtent { what, value });
        }
    }
    Ok(())
}

/// Every element and boundary segment must reference existing vertices.
pub(crate) fn validate_connectivity(mesh: &Mesh) -> MeshResult<()> {
    let nv = mesh.vertices.len();
    for (e, element) in mesh.elements.iter().enumerate() {
        if let Some(&v) = element.vertices.iter().find(|&&v| v >= nv) {
            return Err(MeshError::InconsistentElement { element: e, vertex: v });
        }
        if element.attribute <= 0 {
            return Err(MeshError::InvalidAttribute {
                attr: element.attribute,
            });
        }
    }
    for segment in &mesh.boundary {
        if segment.attribute <= 0 {
            return Err(MeshError::InvalidAttribute {
                attr: segment.attribute,
            });
        }
    }
    Ok(())
}
