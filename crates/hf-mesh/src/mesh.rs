//! Core mesh data structures.

use nalgebra::Point2;
use tracing::debug;

use crate::builder::CartesianMeshBuilder;
use crate::error::{MeshError, MeshResult};

/// Side of the rectangular domain, in boundary storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Bottom,
    Right,
    Top,
    Left,
}

impl Side {
    /// Attribute assigned by the builder (1-based, counter-clockwise from bottom).
    pub fn default_attribute(self) -> i32 {
        match self {
            Side::Bottom => 1,
            Side::Right => 2,
            Side::Top => 3,
            Side::Left => 4,
        }
    }
}

/// Quadrilateral cell. Vertices are counter-clockwise starting at the
/// lower-left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub vertices: [usize; 4],
    pub attribute: i32,
}

/// Boundary segment, oriented counter-clockwise around the domain.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryElement {
    pub vertices: [usize; 2],
    pub attribute: i32,
}

/// Structured quadrilateral mesh of the rectangle `[0, sx] x [0, sy]`.
///
/// Vertex `(i, j)` has index `j * (nx + 1) + i`; element `(ex, ey)` has
/// index `ey * nx + ex`. Boundary segments are stored bottom (left to right),
/// right (bottom to top), top (right to left), left (top to bottom), so after
/// a uniform refinement the children of segment `k` sit at `2k` and `2k + 1`.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub(crate) nx: usize,
    pub(crate) ny: usize,
    pub(crate) extent: [f64; 2],
    pub(crate) vertices: Vec<Point2<f64>>,
    pub(crate) elements: Vec<Element>,
    pub(crate) boundary: Vec<BoundaryElement>,
    pub(crate) bdr_attributes: Vec<i32>,
    pub(crate) attributes: Vec<i32>,
}

impl Mesh {
    pub fn dimension(&self) -> usize {
        2
    }

    /// Number of cells in x and y.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn extent(&self) -> [f64; 2] {
        self.extent
    }

    /// Cell width and height.
    pub fn cell_size(&self) -> (f64, f64) {
        (
            self.extent[0] / self.nx as f64,
            self.extent[1] / self.ny as f64,
        )
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_boundary_elements(&self) -> usize {
        self.boundary.len()
    }

    pub fn vertex(&self, v: usize) -> &Point2<f64> {
        &self.vertices[v]
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, e: usize) -> &Element {
        &self.elements[e]
    }

    pub fn boundary_elements(&self) -> &[BoundaryElement] {
        &self.boundary
    }

    pub fn boundary_element(&self, b: usize) -> &BoundaryElement {
        &self.boundary[b]
    }

    /// Sorted, de-duplicated boundary attributes.
    pub fn bdr_attributes(&self) -> &[i32] {
        &self.bdr_attributes
    }

    /// Sorted, de-duplicated element attributes.
    pub fn attributes(&self) -> &[i32] {
        &self.attributes
    }

    /// Largest boundary attribute, 0 if there is no boundary.
    pub fn max_bdr_attribute(&self) -> i32 {
        self.bdr_attributes.last().copied().unwrap_or(0)
    }

    /// Lattice coordinates `(ex, ey)` of element `e`.
    pub fn element_cell(&self, e: usize) -> (usize, usize) {
        (e % self.nx, e / self.nx)
    }

    /// Lower-left corner of element `e`.
    pub fn element_origin(&self, e: usize) -> Point2<f64> {
        self.vertices[self.elements[e].vertices[0]]
    }

    /// Average of the boundary segment's end points.
    pub fn boundary_midpoint(&self, b: usize) -> Point2<f64> {
        let [v0, v1] = self.boundary[b].vertices;
        nalgebra::center(&self.vertices[v0], &self.vertices[v1])
    }

    /// Side of the domain a boundary segment lies on.
    pub fn boundary_side(&self, b: usize) -> Side {
        let nx = self.nx;
        let ny = self.ny;
        if b < nx {
            Side::Bottom
        } else if b < nx + ny {
            Side::Right
        } else if b < 2 * nx + ny {
            Side::Top
        } else {
            Side::Left
        }
    }

    /// Split every quadrilateral into four. Child elements and child boundary
    /// segments inherit their parent's attribute.
    pub fn uniform_refinement(&mut self) {
        let mut refined = CartesianMeshBuilder::new(2 * self.nx, 2 * self.ny)
            .size(self.extent[0], self.extent[1])
            .build_unchecked();

        let fine_nx = refined.nx;
        for (e, element) in refined.elements.iter_mut().enumerate() {
            let (ex, ey) = (e % fine_nx, e / fine_nx);
            let parent = (ey / 2) * self.nx + ex / 2;
            element.attribute = self.elements[parent].attribute;
        }
        for (b, segment) in refined.boundary.iter_mut().enumerate() {
            segment.attribute = self.boundary[b / 2].attribute;
        }
        refined.set_attributes();

        debug!(
            elements = refined.elements.len(),
            vertices = refined.vertices.len(),
            "uniform refinement"
        );
        *self = refined;
    }

    /// Assign `attr` to every boundary element whose midpoint satisfies
    /// `marker`. Returns the number of elements marked.
    pub fn mark_boundaries<F>(&mut self, attr: i32, marker: F) -> MeshResult<usize>
    where
        F: Fn(&Point2<f64>) -> bool,
    {
        if attr <= 0 {
            return Err(MeshError::InvalidAttribute { attr });
        }
        let mut marked = 0;
        for b in 0..self.boundary.len() {
            let mid = self.boundary_midpoint(b);
            if marker(&mid) {
                self.boundary[b].attribute = attr;
                marked += 1;
            }
        }
        self.set_attributes();
        Ok(marked)
    }

    /// Set the attribute of one boundary element.
    pub fn set_bdr_attribute(&mut self, b: usize, attr: i32) -> MeshResult<()> {
        if attr <= 0 {
            return Err(MeshError::InvalidAttribute { attr });
        }
        let count = self.boundary.len();
        let element = self
            .boundary
            .get_mut(b)
            .ok_or(MeshError::BoundaryIndexOutOfRange { index: b, count })?;
        element.attribute = attr;
        self.set_attributes();
        Ok(())
    }

    /// Recompute the attribute sets after attributes were edited.
    pub fn set_attributes(&mut self) {
        let mut bdr: Vec<i32> = self.boundary.iter().map(|b| b.attribute).collect();
        bdr.sort_unstable();
        bdr.dedup();
        self.bdr_attributes = bdr;

        let mut attrs: Vec<i32> = self.elements.iter().map(|e| e.attribute).collect();
        attrs.sort_unstable();
        attrs.dedup();
        self.attributes = attrs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit(n: usize) -> Mesh {
        CartesianMeshBuilder::new(n, n).build().unwrap()
    }

    #[test]
    fn boundary_sides_follow_storage_order() {
        let mesh = unit(3);
        assert_eq!(mesh.boundary_side(0), Side::Bottom);
        assert_eq!(mesh.boundary_side(3), Side::Right);
        assert_eq!(mesh.boundary_side(6), Side::Top);
        assert_eq!(mesh.boundary_side(11), Side::Left);
        for b in 0..mesh.num_boundary_elements() {
            let side = mesh.boundary_side(b);
            assert_eq!(mesh.boundary_element(b).attribute, side.default_attribute());
        }
    }

    #[test]
    fn refinement_keeps_custom_boundary_attribute() {
        let mut mesh = unit(2);
        let marked = mesh.mark_boundaries(5, |x| x[0] < 1e-9).unwrap();
        assert_eq!(marked, 2);
        mesh.uniform_refinement();
        assert_eq!(mesh.bdr_attributes(), &[1, 2, 3, 5]);
        for b in 0..mesh.num_boundary_elements() {
            let mid = mesh.boundary_midpoint(b);
            let on_left = mid[0] < 1e-9;
            assert_eq!(mesh.boundary_element(b).attribute == 5, on_left);
        }
    }

    #[test]
    fn refinement_keeps_element_attributes() {
        let mut mesh = unit(2);
        mesh.elements[3].attribute = 7;
        mesh.set_attributes();
        mesh.uniform_refinement();
        let tagged: Vec<usize> = (0..mesh.num_elements())
            .filter(|&e| mesh.element(e).attribute == 7)
            .collect();
        assert_eq!(tagged.len(), 4);
        for e in tagged {
            let c = nalgebra::center(
                mesh.vertex(mesh.element(e).vertices[0]),
                mesh.vertex(mesh.element(e).vertices[2]),
            );
            assert!(c[0] > 0.5 && c[1] > 0.5);
        }
    }

    #[test]
    fn set_bdr_attribute_checks_the_index() {
        let mut mesh = unit(2);
        assert_eq!(
            mesh.set_bdr_attribute(8, 5),
            Err(MeshError::BoundaryIndexOutOfRange { index: 8, count: 8 })
        );
        mesh.set_bdr_attribute(7, 5).unwrap();
        assert_eq!(mesh.boundary_element(7).attribute, 5);
        assert_eq!(mesh.bdr_attributes(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn mark_rejects_non_positive_attribute() {
        let mut mesh = unit(1);
        assert!(matches!(
            mesh.mark_boundaries(0, |_| true),
            Err(MeshError::InvalidAttribute { attr: 0 })
        ));
    }

    proptest! {
        #[test]
        fn refinement_quadruples_cells_and_doubles_boundary(nx in 1usize..6, ny in 1usize..6) {
            let mut mesh = CartesianMeshBuilder::new(nx, ny).build().unwrap();
            let (elements, boundary) = (mesh.num_elements(), mesh.num_boundary_elements());
            mesh.uniform_refinement();
            prop_assert_eq!(mesh.num_elements(), 4 * elements);
            prop_assert_eq!(mesh.num_boundary_elements(), 2 * boundary);
            prop_assert_eq!(mesh.num_vertices(), (2 * nx + 1) * (2 * ny + 1));
            prop_assert_eq!(mesh.bdr_attributes(), &[1, 2, 3, 4][..]);
        }
    }
}
