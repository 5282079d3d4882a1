//! Element-level integrators.
//!
//! Every element is an axis-aligned rectangle, so the map from the reference
//! square is `x = origin + (hx xi, hy eta)` with constant Jacobian.

use nalgebra::{DMatrix, DVector, Point2, Vector2};

use crate::basis::ReferenceElement;
use crate::coefficient::{Coefficient, VectorCoefficient};

/// Geometry and tabulated basis for one element at one time.
pub struct ElementContext<'a> {
    pub element: usize,
    pub origin: Point2<f64>,
    pub h: (f64, f64),
    pub reference: &'a ReferenceElement,
    pub time: f64,
}

impl ElementContext<'_> {
    pub fn det_j(&self) -> f64 {
        self.h.0 * self.h.1
    }

    /// Physical location of quadrature point `q`.
    pub fn point(&self, q: usize) -> Point2<f64> {
        let [xi, eta, _] = self.reference.point(q);
        Point2::new(self.origin[0] + xi * self.h.0, self.origin[1] + eta * self.h.1)
    }

    /// Quadrature weight of point `q` including the Jacobian.
    pub fn weight(&self, q: usize) -> f64 {
        self.reference.point(q)[2] * self.det_j()
    }

    /// Physical gradient of local basis function `a` at point `q`.
    pub fn grad(&self, q: usize, a: usize) -> Vector2<f64> {
        Vector2::new(
            self.reference.d_xi()[(q, a)] / self.h.0,
            self.reference.d_eta()[(q, a)] / self.h.1,
        )
    }

    pub fn value(&self, q: usize, a: usize) -> f64 {
        self.reference.values()[(q, a)]
    }
}

/// Adds one term of a bilinear form to an element matrix. Row index is the
/// test function, column index the trial function.
pub trait BilinearIntegrator: Send + Sync {
    fn assemble_element(&self, ctx: &ElementContext<'_>, elmat: &mut DMatrix<f64>);

    fn is_symmetric(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

/// Adds one term of a linear form to an element vector.
pub trait LinearIntegrator: Send + Sync {
    fn assemble_element(&self, ctx: &ElementContext<'_>, elvec: &mut DVector<f64>);

    fn name(&self) -> &'static str;
}

/// `(k grad u, grad v)`
pub struct DiffusionIntegrator {
    coefficient: Box<dyn Coefficient>,
}

impl DiffusionIntegrator {
    pub fn new(coefficient: impl Coefficient + 'static) -> Self {
        Self {
            coefficient: Box::new(coefficient),
        }
    }
}

impl BilinearIntegrator for DiffusionIntegrator {
    fn assemble_element(&self, ctx: &ElementContext<'_>, elmat: &mut DMatrix<f64>) {
        let nd = ctx.reference.num_dofs();
        for q in 0..ctx.reference.num_points() {
            let w = ctx.weight(q) * self.coefficient.eval(&ctx.point(q), ctx.time);
            let grads: Vec<Vector2<f64>> = (0..nd).map(|a| ctx.grad(q, a)).collect();
            for a in 0..nd {
                for b in 0..nd {
                    elmat[(a, b)] += w * grads[a].dot(&grads[b]);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "diffusion"
    }
}

/// `(rho u, v)`
pub struct MassIntegrator {
    coefficient: Box<dyn Coefficient>,
}

impl MassIntegrator {
    pub fn new(coefficient: impl Coefficient + 'static) -> Self {
        Self {
            coefficient: Box::new(coefficient),
        }
    }
}

impl BilinearIntegrator for MassIntegrator {
    fn assemble_element(&self, ctx: &ElementContext<'_>, elmat: &mut DMatrix<f64>) {
        let nd = ctx.reference.num_dofs();
        for q in 0..ctx.reference.num_points() {
            let w = ctx.weight(q) * self.coefficient.eval(&ctx.point(q), ctx.time);
            for a in 0..nd {
                let wa = w * ctx.value(q, a);
                for b in 0..nd {
                    elmat[(a, b)] += wa * ctx.value(q, b);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "mass"
    }
}

/// `(b . grad u, v)`
pub struct ConvectionIntegrator {
    velocity: Box<dyn VectorCoefficient>,
}

impl ConvectionIntegrator {
    pub fn new(velocity: impl VectorCoefficient + 'static) -> Self {
        Self {
            velocity: Box::new(velocity),
        }
    }
}

impl BilinearIntegrator for ConvectionIntegrator {
    fn assemble_element(&self, ctx: &ElementContext<'_>, elmat: &mut DMatrix<f64>) {
        let nd = ctx.reference.num_dofs();
        for q in 0..ctx.reference.num_points() {
            let w = ctx.weight(q);
            let b = self.velocity.eval(&ctx.point(q), ctx.time);
            for trial in 0..nd {
                let adv = w * b.dot(&ctx.grad(q, trial));
                for test in 0..nd {
                    elmat[(test, trial)] += adv * ctx.value(q, test);
                }
            }
        }
    }

    fn is_symmetric(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "convection"
    }
}

/// `(f, v)`
pub struct DomainLoadIntegrator {
    source: Box<dyn Coefficient>,
}

impl DomainLoadIntegrator {
    pub fn new(source: impl Coefficient + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl LinearIntegrator for DomainLoadIntegrator {
    fn assemble_element(&self, ctx: &ElementContext<'_>, elvec: &mut DVector<f64>) {
        for q in 0..ctx.reference.num_points() {
            let w = ctx.weight(q) * self.source.eval(&ctx.point(q), ctx.time);
            for a in 0..ctx.reference.num_dofs() {
                elvec[a] += w * ctx.value(q, a);
            }
        }
    }

    fn name(&self) -> &'static str {
        "domain load"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficient::{ConstantCoefficient, ConstantVectorCoefficient};

    fn ctx(reference: &ReferenceElement, h: f64) -> ElementContext<'_> {
        ElementContext {
            element: 0,
            origin: Point2::origin(),
            h: (h, h),
            reference,
            time: 0.0,
        }
    }

    #[test]
    fn mass_entries_sum_to_area() {
        let re = ReferenceElement::new(2, 4);
        let mut m = DMatrix::zeros(9, 9);
        MassIntegrator::new(ConstantCoefficient(1.0)).assemble_element(&ctx(&re, 0.5), &mut m);
        assert!((m.sum() - 0.25).abs() < 1e-14);
    }

    #[test]
    fn bilinear_q1_stiffness_matches_closed_form() {
        let re = ReferenceElement::new(1, 2);
        let mut k = DMatrix::zeros(4, 4);
        DiffusionIntegrator::new(ConstantCoefficient(1.0)).assemble_element(&ctx(&re, 1.0), &mut k);
        // Square Q1 element: diagonal 2/3, edge neighbours -1/6, opposite -1/3.
        assert!((k[(0, 0)] - 2.0 / 3.0).abs() < 1e-14);
        assert!((k[(0, 1)] + 1.0 / 6.0).abs() < 1e-14);
        assert!((k[(0, 3)] + 1.0 / 3.0).abs() < 1e-14);
        let row_sums = k.column_sum();
        assert!(row_sums.iter().all(|s| s.abs() < 1e-14));
    }

    #[test]
    fn convection_annihilates_constants() {
        let re = ReferenceElement::new(2, 4);
        let mut c = DMatrix::zeros(9, 9);
        ConvectionIntegrator::new(ConstantVectorCoefficient::new(1.0, -2.0))
            .assemble_element(&ctx(&re, 0.25), &mut c);
        let ones = DVector::from_element(9, 1.0);
        assert!((c * ones).norm() < 1e-13);
    }

    #[test]
    fn load_of_constant_integrates_exactly() {
        let re = ReferenceElement::new(3, 5);
        let mut v = DVector::zeros(16);
        DomainLoadIntegrator::new(ConstantCoefficient(3.0)).assemble_element(&ctx(&re, 2.0), &mut v);
        assert!((v.sum() - 12.0).abs() < 1e-12);
    }
}
