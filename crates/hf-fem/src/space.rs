//! Continuous H1 Lagrange space on a structured quadrilateral mesh.

use std::sync::Arc;

use hf_mesh::{BoundaryMarker, Mesh};
use nalgebra::Point2;

use crate::error::{FemError, FemResult};

/// Highest supported polynomial order. Equispaced nodes get badly
/// conditioned past this.
pub const MAX_ORDER: usize = 8;

/// H1 space of order `p`. Dofs live on the `(nx p + 1) x (ny p + 1)` node
/// lattice, numbered row by row from the lower-left corner.
#[derive(Clone, Debug)]
pub struct FiniteElementSpace {
    mesh: Arc<Mesh>,
    order: usize,
    nodes_x: usize,
    nodes_y: usize,
}

impl FiniteElementSpace {
    pub fn new(mesh: Arc<Mesh>, order: usize) -> FemResult<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(FemError::InvalidOrder {
                order,
                max: MAX_ORDER,
            });
        }
        let (nx, ny) = mesh.grid_size();
        Ok(Self {
            nodes_x: nx * order + 1,
            nodes_y: ny * order + 1,
            mesh,
            order,
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn ndofs(&self) -> usize {
        self.nodes_x * self.nodes_y
    }

    pub fn num_elements(&self) -> usize {
        self.mesh.num_elements()
    }

    /// Dofs per element, `(p + 1)^2`.
    pub fn element_ndofs(&self) -> usize {
        (self.order + 1) * (self.order + 1)
    }

    /// Global dofs of element `e` in local order `j * (p + 1) + i`.
    pub fn element_dofs(&self, e: usize) -> Vec<usize> {
        let (ex, ey) = self.mesh.element_cell(e);
        let p = self.order;
        let mut dofs = Vec::with_capacity(self.element_ndofs());
        for j in 0..=p {
            for i in 0..=p {
                dofs.push((ey * p + j) * self.nodes_x + ex * p + i);
            }
        }
        dofs
    }

    /// Local indices of the element-interior dofs (empty for order 1).
    pub fn local_interior(&self) -> Vec<usize> {
        let p = self.order;
        let mut local = Vec::new();
        for j in 1..p {
            for i in 1..p {
                local.push(j * (p + 1) + i);
            }
        }
        local
    }

    /// Local indices of the dofs on the element boundary.
    pub fn local_skeleton(&self) -> Vec<usize> {
        let p = self.order;
        (0..self.element_ndofs())
            .filter(|a| {
                let (i, j) = (a % (p + 1), a / (p + 1));
                i == 0 || j == 0 || i == p || j == p
            })
            .collect()
    }

    /// Global dofs that belong to the interior of element `e` only.
    pub fn interior_dofs(&self, e: usize) -> Vec<usize> {
        let dofs = self.element_dofs(e);
        self.local_interior().into_iter().map(|a| dofs[a]).collect()
    }

    /// Physical coordinates of dof `d`.
    pub fn dof_coord(&self, d: usize) -> Point2<f64> {
        let (hx, hy) = self.mesh.cell_size();
        let p = self.order as f64;
        let (ix, iy) = (d % self.nodes_x, d / self.nodes_x);
        Point2::new(ix as f64 * hx / p, iy as f64 * hy / p)
    }

    /// Dof on mesh vertex `v`.
    pub fn vertex_dof(&self, v: usize) -> usize {
        let (nx, _) = self.mesh.grid_size();
        let (i, j) = (v % (nx + 1), v / (nx + 1));
        j * self.order * self.nodes_x + i * self.order
    }

    /// The `p + 1` dofs along boundary segment `b`, from its first vertex
    /// to its second.
    pub fn boundary_dofs(&self, b: usize) -> Vec<usize> {
        let [v0, v1] = self.mesh.boundary_element(b).vertices;
        let (d0, d1) = (self.vertex_dof(v0), self.vertex_dof(v1));
        let (x0, y0) = ((d0 % self.nodes_x) as isize, (d0 / self.nodes_x) as isize);
        let (x1, y1) = ((d1 % self.nodes_x) as isize, (d1 / self.nodes_x) as isize);
        let p = self.order as isize;
        let (sx, sy) = ((x1 - x0) / p, (y1 - y0) / p);
        (0..=p)
            .map(|k| ((y0 + k * sy) as usize) * self.nodes_x + (x0 + k * sx) as usize)
            .collect()
    }

    /// Sorted dofs on every boundary segment whose attribute is marked.
    pub fn essential_dofs(&self, marker: &BoundaryMarker) -> Vec<usize> {
        let mut dofs: Vec<usize> = marker
            .marked_boundary_elements(&self.mesh)
            .into_iter()
            .flat_map(|b| self.boundary_dofs(b))
            .collect();
        dofs.sort_unstable();
        dofs.dedup();
        dofs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_mesh::CartesianMeshBuilder;

    fn space(n: usize, order: usize) -> FiniteElementSpace {
        let mesh = CartesianMeshBuilder::new(n, n).build().unwrap();
        FiniteElementSpace::new(Arc::new(mesh), order).unwrap()
    }

    #[test]
    fn dof_counts_follow_lattice() {
        assert_eq!(space(2, 1).ndofs(), 9);
        assert_eq!(space(2, 2).ndofs(), 25);
        assert_eq!(space(4, 3).ndofs(), 13 * 13);
    }

    #[test]
    fn order_zero_is_rejected() {
        let mesh = Arc::new(CartesianMeshBuilder::new(1, 1).build().unwrap());
        assert!(matches!(
            FiniteElementSpace::new(mesh, 0),
            Err(FemError::InvalidOrder { order: 0, .. })
        ));
    }

    #[test]
    fn neighbouring_elements_share_an_edge_of_dofs() {
        let fes = space(2, 2);
        let left = fes.element_dofs(0);
        let right = fes.element_dofs(1);
        let shared: Vec<usize> = left.iter().filter(|d| right.contains(d)).copied().collect();
        assert_eq!(shared.len(), 3);
        for d in shared {
            assert!((fes.dof_coord(d)[0] - 0.5).abs() < 1e-14);
        }
    }

    #[test]
    fn interior_and_skeleton_partition_element() {
        let fes = space(1, 3);
        let interior = fes.local_interior();
        let skeleton = fes.local_skeleton();
        assert_eq!(interior.len(), 4);
        assert_eq!(interior.len() + skeleton.len(), fes.element_ndofs());
        assert!(interior.iter().all(|a| !skeleton.contains(a)));
    }

    #[test]
    fn all_boundary_marks_outer_ring() {
        let fes = space(3, 2);
        let mesh = fes.mesh().clone();
        let ess = fes.essential_dofs(&BoundaryMarker::all(&mesh));
        assert_eq!(ess.len(), 4 * 6);
        for d in ess {
            let x = fes.dof_coord(d);
            let on_edge = x[0] < 1e-12 || x[1] < 1e-12 || x[0] > 1.0 - 1e-12 || x[1] > 1.0 - 1e-12;
            assert!(on_edge);
        }
    }

    #[test]
    fn boundary_dofs_run_along_segment() {
        let fes = space(2, 3);
        let mesh = fes.mesh().clone();
        for b in 0..mesh.num_boundary_elements() {
            let dofs = fes.boundary_dofs(b);
            let [v0, v1] = mesh.boundary_element(b).vertices;
            assert!((fes.dof_coord(dofs[0]) - mesh.vertex(v0)).norm() < 1e-14);
            assert!((fes.dof_coord(dofs[3]) - mesh.vertex(v1)).norm() < 1e-14);
        }
    }
}
