//! Linear systems formed from an assembled bilinear form.
//!
//! Essential dofs are removed from the system outright: the reduced operator
//! only acts on free dofs and their boundary values move to the right-hand
//! side. With static condensation the element-interior dofs are eliminated
//! first, leaving a Schur complement on the element skeleton.

use std::sync::Arc;

use hf_solver::{LinearOperator, restrict, spmv_add};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use tracing::debug;

use crate::bilinear::{AssemblyLevel, BilinearForm, ElementOperator};
use crate::error::{FemError, FemResult};

/// Operator of a reduced system.
pub enum SystemOperator {
    Assembled(Arc<CsrMatrix<f64>>),
    MatrixFree(ReducedOperator),
}

/// Element operator restricted to the free dofs.
pub struct ReducedOperator {
    inner: ElementOperator,
    free: Vec<usize>,
}

impl LinearOperator for ReducedOperator {
    fn nrows(&self) -> usize {
        self.free.len()
    }

    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        let n = self.inner.nrows();
        let mut full_x = DVector::zeros(n);
        for (r, &d) in self.free.iter().enumerate() {
            full_x[d] = x[r];
        }
        let mut full_y = DVector::zeros(n);
        self.inner.apply(&full_x, &mut full_y);
        for (r, &d) in self.free.iter().enumerate() {
            y[r] = full_y[d];
        }
    }

    fn diagonal(&self) -> DVector<f64> {
        let diag = self.inner.diagonal();
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&d| diag[d]))
    }
}

struct CondensedElement {
    interior: Vec<usize>,
    skeleton: Vec<usize>,
    /// `A_ii^-1 A_is`
    interior_coupling: DMatrix<f64>,
    /// `A_ii^-1 b_i`
    interior_rhs: DVector<f64>,
}

struct Condensation {
    /// Skeleton index -> global dof.
    skeleton: Vec<usize>,
    elements: Vec<CondensedElement>,
}

/// `A x = b` on the free dofs, plus what is needed to rebuild the full
/// solution vector.
pub struct LinearSystem {
    operator: SystemOperator,
    rhs: DVector<f64>,
    /// Reduced index -> index in the outer space (global dofs, or skeleton
    /// dofs when condensed).
    free: Vec<usize>,
    /// Outer-space vector carrying the essential values.
    outer_values: DVector<f64>,
    condensation: Option<Condensation>,
    full_size: usize,
}

impl LinearSystem {
    /// Number of unknowns actually solved for.
    pub fn size(&self) -> usize {
        self.rhs.len()
    }

    /// Dofs in the underlying space.
    pub fn full_size(&self) -> usize {
        self.full_size
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    pub fn operator(&self) -> &dyn LinearOperator {
        match &self.operator {
            SystemOperator::Assembled(a) => a.as_ref() as &dyn LinearOperator,
            SystemOperator::MatrixFree(op) => op,
        }
    }

    /// Reduced CSR matrix when the form was fully assembled.
    pub fn matrix(&self) -> Option<&Arc<CsrMatrix<f64>>> {
        match &self.operator {
            SystemOperator::Assembled(a) => Some(a),
            SystemOperator::MatrixFree(_) => None,
        }
    }

    pub fn is_condensed(&self) -> bool {
        self.condensation.is_some()
    }

    /// Zero vector of the reduced size.
    pub fn initial_guess(&self) -> DVector<f64> {
        DVector::zeros(self.size())
    }

    /// Full dof vector from a reduced solution.
    pub fn recover(&self, reduced: &DVector<f64>) -> FemResult<DVector<f64>> {
        if reduced.len() != self.size() {
            return Err(FemError::DimensionMismatch {
                what: "reduced solution",
                expected: self.size(),
                actual: reduced.len(),
            });
        }
        let mut outer = self.outer_values.clone();
        for (r, &o) in self.free.iter().enumerate() {
            outer[o] = reduced[r];
        }
        let Some(condensation) = &self.condensation else {
            return Ok(outer);
        };

        let mut full = DVector::zeros(self.full_size);
        for (s, &g) in condensation.skeleton.iter().enumerate() {
            full[g] = outer[s];
        }
        for el in &condensation.elements {
            let xs = DVector::from_iterator(el.skeleton.len(), el.skeleton.iter().map(|&g| full[g]));
            let xi = &el.interior_rhs - &el.interior_coupling * xs;
            for (k, &g) in el.interior.iter().enumerate() {
                full[g] = xi[k];
            }
        }
        Ok(full)
    }
}

impl BilinearForm {
    /// Reduce `A x = b` by the essential dofs `ess`, whose values are taken
    /// from `x`. The form must be assembled.
    pub fn form_linear_system(
        &self,
        ess: &[usize],
        x: &DVector<f64>,
        b: &DVector<f64>,
    ) -> FemResult<LinearSystem> {
        let n = self.size();
        for (what, v) in [("solution vector", x), ("right-hand side", b)] {
            if v.len() != n {
                return Err(FemError::DimensionMismatch {
                    what,
                    expected: n,
                    actual: v.len(),
                });
            }
        }
        if let Some(&bad) = ess.iter().find(|&&d| d >= n) {
            return Err(FemError::DimensionMismatch {
                what: "essential dof index bound",
                expected: n,
                actual: bad,
            });
        }

        let system = match self.assembly_level() {
            AssemblyLevel::Partial => {
                let inner = self.element_operator()?;
                let (is_ess, x_ess) = essential_part(n, ess, x);
                let mut b_mod = b.clone();
                b_mod -= inner.matvec(&x_ess);
                let free = free_dofs(&is_ess);
                let rhs = gather(&b_mod, &free);
                LinearSystem {
                    operator: SystemOperator::MatrixFree(ReducedOperator {
                        inner,
                        free: free.clone(),
                    }),
                    rhs,
                    free,
                    outer_values: x.clone(),
                    condensation: None,
                    full_size: n,
                }
            }
            AssemblyLevel::Full
                if self.static_condensation() && !self.space().local_interior().is_empty() =>
            {
                self.condensed_system(ess, x, b)?
            }
            AssemblyLevel::Full => {
                let a = self.matrix()?;
                let (reduced, rhs, free) = eliminate(a, b, x, ess);
                LinearSystem {
                    operator: SystemOperator::Assembled(Arc::new(reduced)),
                    rhs,
                    free,
                    outer_values: x.clone(),
                    condensation: None,
                    full_size: n,
                }
            }
        };
        debug!(
            full = n,
            reduced = system.size(),
            condensed = system.is_condensed(),
            "linear system formed"
        );
        Ok(system)
    }

    /// Full solution from the reduced one, restoring essential values and
    /// condensed interior dofs.
    pub fn recover_solution(
        &self,
        system: &LinearSystem,
        reduced: &DVector<f64>,
    ) -> FemResult<DVector<f64>> {
        system.recover(reduced)
    }

    fn condensed_system(
        &self,
        ess: &[usize],
        x: &DVector<f64>,
        b: &DVector<f64>,
    ) -> FemResult<LinearSystem> {
        let space = self.space();
        let n = space.ndofs();
        let element_matrices = self.element_matrices().ok_or(FemError::NotAssembled {
            what: "element matrices",
        })?;
        let local_int = space.local_interior();
        let local_skel = space.local_skeleton();

        let mut is_interior = vec![false; n];
        for e in 0..space.num_elements() {
            for d in space.interior_dofs(e) {
                is_interior[d] = true;
            }
        }
        if let Some(&dof) = ess.iter().find(|&&d| is_interior[d]) {
            return Err(FemError::InteriorEssentialDof { dof });
        }
        let skeleton: Vec<usize> = (0..n).filter(|&d| !is_interior[d]).collect();
        let mut skeleton_pos = vec![usize::MAX; n];
        for (s, &g) in skeleton.iter().enumerate() {
            skeleton_pos[g] = s;
        }

        let ns = skeleton.len();
        let mut coo = CooMatrix::new(ns, ns);
        let mut rhs_s = gather(b, &skeleton);
        let mut elements = Vec::with_capacity(space.num_elements());
        for (e, elmat) in element_matrices.iter().enumerate() {
            let dofs = space.element_dofs(e);
            let a_ii = elmat.select_rows(&local_int).select_columns(&local_int);
            let a_is = elmat.select_rows(&local_int).select_columns(&local_skel);
            let a_si = elmat.select_rows(&local_skel).select_columns(&local_int);
            let a_ss = elmat.select_rows(&local_skel).select_columns(&local_skel);

            let lu = a_ii.lu();
            let singular = FemError::SingularElement { element: e };
            let interior_coupling = lu.solve(&a_is).ok_or(singular.clone())?;
            let b_i = DVector::from_iterator(local_int.len(), local_int.iter().map(|&a| b[dofs[a]]));
            let interior_rhs = lu.solve(&b_i).ok_or(singular)?;

            let schur = a_ss - &a_si * &interior_coupling;
            let rhs_e = &a_si * &interior_rhs;
            let skel_globals: Vec<usize> = local_skel.iter().map(|&a| dofs[a]).collect();
            for (r, &gr) in skel_globals.iter().enumerate() {
                let sr = skeleton_pos[gr];
                rhs_s[sr] -= rhs_e[r];
                for (c, &gc) in skel_globals.iter().enumerate() {
                    coo.push(sr, skeleton_pos[gc], schur[(r, c)]);
                }
            }
            elements.push(CondensedElement {
                interior: local_int.iter().map(|&a| dofs[a]).collect(),
                skeleton: skel_globals,
                interior_coupling,
                interior_rhs,
            });
        }
        let schur = CsrMatrix::from(&coo);

        let ess_s: Vec<usize> = ess.iter().map(|&d| skeleton_pos[d]).collect();
        let x_s = gather(x, &skeleton);
        let (reduced, rhs, free) = eliminate(&schur, &rhs_s, &x_s, &ess_s);
        Ok(LinearSystem {
            operator: SystemOperator::Assembled(Arc::new(reduced)),
            rhs,
            free,
            outer_values: x_s,
            condensation: Some(Condensation { skeleton, elements }),
            full_size: n,
        })
    }
}

fn essential_part(n: usize, ess: &[usize], x: &DVector<f64>) -> (Vec<bool>, DVector<f64>) {
    let mut is_ess = vec![false; n];
    let mut x_ess = DVector::zeros(n);
    for &d in ess {
        is_ess[d] = true;
        x_ess[d] = x[d];
    }
    (is_ess, x_ess)
}

fn free_dofs(is_ess: &[bool]) -> Vec<usize> {
    (0..is_ess.len()).filter(|&i| !is_ess[i]).collect()
}

fn gather(v: &DVector<f64>, idx: &[usize]) -> DVector<f64> {
    DVector::from_iterator(idx.len(), idx.iter().map(|&i| v[i]))
}

/// `A_ff` and `(b - A x_e)_f` with `x_e` the essential part of `x`.
fn eliminate(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    x: &DVector<f64>,
    ess: &[usize],
) -> (CsrMatrix<f64>, DVector<f64>, Vec<usize>) {
    let n = a.nrows();
    let (is_ess, x_ess) = essential_part(n, ess, x);
    let mut b_mod = b.clone();
    spmv_add(-1.0, a, &x_ess, &mut b_mod);

    let free = free_dofs(&is_ess);
    let mut map = vec![None; n];
    for (r, &d) in free.iter().enumerate() {
        map[d] = Some(r);
    }
    let reduced = restrict(a, &map, &map, free.len(), free.len());
    let rhs = gather(&b_mod, &free);
    (reduced, rhs, free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficient::{Coefficient, ConstantCoefficient, FunctionCoefficient};
    use crate::integrators::{DiffusionIntegrator, MassIntegrator};
    use crate::space::FiniteElementSpace;
    use hf_mesh::{BoundaryMarker, CartesianMeshBuilder};
    use hf_solver::{CholeskySolver, LinearSolver};

    fn form(n: usize, order: usize) -> BilinearForm {
        let mesh = CartesianMeshBuilder::new(n, n).build().unwrap();
        let fes = Arc::new(FiniteElementSpace::new(Arc::new(mesh), order).unwrap());
        let mut a = BilinearForm::new(fes);
        a.add_domain_integrator(DiffusionIntegrator::new(ConstantCoefficient(1.0)));
        a.add_domain_integrator(MassIntegrator::new(ConstantCoefficient(1.0)));
        a
    }

    fn solve(system: &LinearSystem) -> DVector<f64> {
        let mut solver = CholeskySolver::new();
        solver.set_operator(Arc::clone(system.matrix().unwrap())).unwrap();
        let mut x = system.initial_guess();
        solver.solve(system.rhs(), &mut x).unwrap();
        x
    }

    fn boundary_data(a: &BilinearForm) -> (Vec<usize>, DVector<f64>, DVector<f64>) {
        let space = a.space();
        let ess = space.essential_dofs(&BoundaryMarker::all(space.mesh()));
        let g = FunctionCoefficient::time_independent(|x| 1.0 + x[0] - 0.5 * x[1]);
        let mut x = DVector::zeros(space.ndofs());
        for &d in &ess {
            x[d] = g.eval(&space.dof_coord(d), 0.0);
        }
        let b = DVector::from_fn(space.ndofs(), |i, _| 0.01 * (i % 7) as f64);
        (ess, x, b)
    }

    #[test]
    fn reduced_system_drops_essential_dofs() {
        let mut a = form(3, 1);
        a.assemble(0.0).unwrap();
        let (ess, x, b) = boundary_data(&a);
        let system = a.form_linear_system(&ess, &x, &b).unwrap();
        assert_eq!(system.size(), 4);
        assert_eq!(system.full_size(), 16);

        let full = a.recover_solution(&system, &solve(&system)).unwrap();
        for &d in &ess {
            assert_eq!(full[d], x[d]);
        }
        let residual = a.matrix().unwrap().matvec(&full) - &b;
        let free_residual: f64 = (0..full.len())
            .filter(|d| !ess.contains(d))
            .map(|d| residual[d].abs())
            .fold(0.0, f64::max);
        assert!(free_residual < 1e-10);
    }

    #[test]
    fn static_condensation_gives_the_same_solution() {
        let mut plain = form(3, 3);
        let mut condensed = form(3, 3);
        condensed.enable_static_condensation();
        plain.assemble(0.0).unwrap();
        condensed.assemble(0.0).unwrap();
        let (ess, x, b) = boundary_data(&plain);

        let sys_plain = plain.form_linear_system(&ess, &x, &b).unwrap();
        let sys_cond = condensed.form_linear_system(&ess, &x, &b).unwrap();
        assert!(sys_cond.is_condensed());
        // 9 elements with 4 interior dofs each are gone.
        assert_eq!(sys_plain.size() - sys_cond.size(), 36);

        let u_plain = plain.recover_solution(&sys_plain, &solve(&sys_plain)).unwrap();
        let u_cond = condensed.recover_solution(&sys_cond, &solve(&sys_cond)).unwrap();
        assert!((u_plain - u_cond).norm() < 1e-9);
    }

    #[test]
    fn condensation_is_a_no_op_for_linear_elements() {
        let mut a = form(2, 1);
        a.enable_static_condensation();
        a.assemble(0.0).unwrap();
        let (ess, x, b) = boundary_data(&a);
        let system = a.form_linear_system(&ess, &x, &b).unwrap();
        assert!(!system.is_condensed());
        assert_eq!(system.size(), 1);
    }

    #[test]
    fn matrix_free_system_matches_assembled_one() {
        let mut full = form(2, 2);
        let mut partial = form(2, 2);
        partial.set_assembly_level(AssemblyLevel::Partial);
        full.assemble(0.0).unwrap();
        partial.assemble(0.0).unwrap();
        let (ess, x, b) = boundary_data(&full);

        let sys_full = full.form_linear_system(&ess, &x, &b).unwrap();
        let sys_partial = partial.form_linear_system(&ess, &x, &b).unwrap();
        assert!(sys_partial.matrix().is_none());
        assert!((sys_full.rhs() - sys_partial.rhs()).norm() < 1e-12);

        let v = DVector::from_fn(sys_full.size(), |i, _| 1.0 + i as f64);
        let y_full = sys_full.operator().matvec(&v);
        let y_partial = sys_partial.operator().matvec(&v);
        assert!((y_full - y_partial).norm() < 1e-12);
        assert!((sys_full.operator().diagonal() - sys_partial.operator().diagonal()).norm() < 1e-12);
    }

    #[test]
    fn condensation_rejects_interior_essential_dofs() {
        let mut a = form(2, 3);
        a.enable_static_condensation();
        a.assemble(0.0).unwrap();
        let n = a.size();
        let interior = a.space().interior_dofs(0)[0];
        let zeros = DVector::zeros(n);
        assert!(matches!(
            a.form_linear_system(&[0, interior], &zeros, &zeros),
            Err(FemError::InteriorEssentialDof { dof }) if dof == interior
        ));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut a = form(2, 1);
        a.assemble(0.0).unwrap();
        let short = DVector::zeros(3);
        let ok = DVector::zeros(9);
        assert!(matches!(
            a.form_linear_system(&[], &short, &ok),
            Err(FemError::DimensionMismatch { .. })
        ));
        let system = a.form_linear_system(&[], &ok, &ok).unwrap();
        assert!(system.recover(&short).is_err());
    }
}
