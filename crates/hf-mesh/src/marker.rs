//! Essential-boundary markers.

use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;

/// One flag per boundary attribute `1..=max`, true where the boundary is
/// essential (Dirichlet).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryMarker {
    flags: Vec<bool>,
}

impl BoundaryMarker {
    /// Mark every boundary attribute present on the mesh.
    pub fn all(mesh: &Mesh) -> Self {
        Self {
            flags: vec![true; mesh.max_bdr_attribute().max(0) as usize],
        }
    }

    /// Mark nothing.
    pub fn none(mesh: &Mesh) -> Self {
        Self {
            flags: vec![false; mesh.max_bdr_attribute().max(0) as usize],
        }
    }

    /// Mark the listed attributes. Attributes outside `1..=max` are rejected.
    pub fn from_attributes(mesh: &Mesh, attrs: &[i32]) -> MeshResult<Self> {
        let max = mesh.max_bdr_attribute();
        let mut marker = Self::none(mesh);
        for &attr in attrs {
            if attr < 1 || attr > max {
                return Err(MeshError::UnknownBoundaryAttribute { attr, max });
            }
            marker.flags[(attr - 1) as usize] = true;
        }
        Ok(marker)
    }

    pub fn is_marked(&self, attr: i32) -> bool {
        attr >= 1 && self.flags.get((attr - 1) as usize).copied().unwrap_or(false)
    }

    /// Number of attribute slots (the mesh's max attribute at creation).
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Indices of the boundary elements carrying a marked attribute.
    pub fn marked_boundary_elements(&self, mesh: &Mesh) -> Vec<usize> {
        mesh.boundary_elements()
            .iter()
            .enumerate()
            .filter(|(_, b)| self.is_marked(b.attribute))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CartesianMeshBuilder;

    #[test]
    fn all_marks_every_side() {
        let mesh = CartesianMeshBuilder::new(2, 2).build().unwrap();
        let marker = BoundaryMarker::all(&mesh);
        assert_eq!(marker.len(), 4);
        assert_eq!(marker.marked_boundary_elements(&mesh).len(), 8);
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let mesh = CartesianMeshBuilder::new(2, 2).build().unwrap();
        let err = BoundaryMarker::from_attributes(&mesh, &[5]).unwrap_err();
        assert_eq!(err, MeshError::UnknownBoundaryAttribute { attr: 5, max: 4 });
        assert!(BoundaryMarker::from_attributes(&mesh, &[0]).is_err());
    }

    #[test]
    fn subset_marks_only_listed_sides() {
        let mesh = CartesianMeshBuilder::new(2, 2).build().unwrap();
        let marker = BoundaryMarker::from_attributes(&mesh, &[1, 3]).unwrap();
        assert!(marker.is_marked(1));
        assert!(!marker.is_marked(2));
        assert!(marker.is_marked(3));
        assert!(!marker.is_marked(4));
        assert!(!marker.is_marked(9));
        assert_eq!(marker.marked_boundary_elements(&mesh), vec![0, 1, 4, 5]);
    }
}
