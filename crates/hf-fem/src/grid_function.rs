//! Discrete fields on a finite element space.

use std::sync::Arc;

use hf_mesh::BoundaryMarker;
use nalgebra::DVector;

use crate::basis::{LagrangeBasis1D, ReferenceElement};
use crate::coefficient::Coefficient;
use crate::error::{FemError, FemResult};
use crate::integrators::ElementContext;
use crate::space::FiniteElementSpace;

/// Dof vector bound to its space.
#[derive(Clone, Debug)]
pub struct GridFunction {
    space: Arc<FiniteElementSpace>,
    values: DVector<f64>,
}

impl GridFunction {
    pub fn new(space: Arc<FiniteElementSpace>) -> Self {
        let values = DVector::zeros(space.ndofs());
        Self { space, values }
    }

    pub fn from_values(space: Arc<FiniteElementSpace>, values: DVector<f64>) -> FemResult<Self> {
        if values.len() != space.ndofs() {
            return Err(FemError::DimensionMismatch {
                what: "grid function values",
                expected: space.ndofs(),
                actual: values.len(),
            });
        }
        Ok(Self { space, values })
    }

    pub fn space(&self) -> &Arc<FiniteElementSpace> {
        &self.space
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<f64> {
        &mut self.values
    }

    pub fn into_values(self) -> DVector<f64> {
        self.values
    }

    /// Nodal interpolation of `coef` at time `t`.
    pub fn project_coefficient(&mut self, coef: &dyn Coefficient, t: f64) {
        for d in 0..self.values.len() {
            self.values[d] = coef.eval(&self.space.dof_coord(d), t);
        }
    }

    /// Interpolate `coef` on the dofs of marked boundaries only.
    pub fn project_boundary_coefficient(
        &mut self,
        coef: &dyn Coefficient,
        marker: &BoundaryMarker,
        t: f64,
    ) {
        for d in self.space.essential_dofs(marker) {
            self.values[d] = coef.eval(&self.space.dof_coord(d), t);
        }
    }

    /// `|| u_h - exact ||_L2` over the whole domain.
    pub fn l2_error(&self, exact: &dyn Coefficient, t: f64) -> f64 {
        let reference = ReferenceElement::new(self.space.order(), self.space.order() + 3);
        let mesh = self.space.mesh();
        let h = mesh.cell_size();
        let mut total = 0.0;
        for e in 0..self.space.num_elements() {
            let dofs = self.space.element_dofs(e);
            let ctx = ElementContext {
                element: e,
                origin: mesh.element_origin(e),
                h,
                reference: &reference,
                time: t,
            };
            for q in 0..reference.num_points() {
                let uh: f64 = dofs
                    .iter()
                    .enumerate()
                    .map(|(a, &d)| self.values[d] * ctx.value(q, a))
                    .sum();
                let diff = uh - exact.eval(&ctx.point(q), t);
                total += ctx.weight(q) * diff * diff;
            }
        }
        total.sqrt()
    }

    /// Value at reference coordinates `(xi, eta)` of element `e`.
    pub fn value_in_element(&self, e: usize, xi: f64, eta: f64) -> f64 {
        let basis = LagrangeBasis1D::new(self.space.order());
        let (lx, ly) = (basis.values(xi), basis.values(eta));
        let np = lx.len();
        self.space
            .element_dofs(e)
            .into_iter()
            .enumerate()
            .map(|(a, d)| self.values[d] * lx[a % np] * ly[a / np])
            .sum()
    }

    /// Values at the mesh vertices, in vertex order.
    pub fn values_at_vertices(&self) -> Vec<f64> {
        (0..self.space.mesh().num_vertices())
            .map(|v| self.values[self.space.vertex_dof(v)])
            .collect()
    }
}
