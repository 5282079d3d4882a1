//! Preconditioners and smoothers.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::error::{SolverError, SolverResult};
use crate::operator::LinearOperator;

/// Approximate inverse `z = B r`.
pub trait Preconditioner {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>);
}

/// Preconditioner selection for stateful solvers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PreconditionerKind {
    #[default]
    None,
    Jacobi,
    /// Symmetric Gauss-Seidel (one forward plus one backward sweep).
    GaussSeidel,
}

impl PreconditionerKind {
    /// Build the preconditioner for an assembled matrix.
    pub fn build(self, a: &CsrMatrix<f64>) -> SolverResult<Box<dyn Preconditioner>> {
        Ok(match self {
            PreconditionerKind::None => Box::new(IdentityPreconditioner),
            PreconditionerKind::Jacobi => Box::new(JacobiPreconditioner::new(a)?),
            PreconditionerKind::GaussSeidel => Box::new(GaussSeidelSmoother::new(a)?),
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        z.copy_from(r);
    }
}

/// Diagonal scaling. Works for any operator that can report its diagonal,
/// including matrix-free ones.
#[derive(Clone, Debug)]
pub struct JacobiPreconditioner {
    inv_diag: DVector<f64>,
}

impl JacobiPreconditioner {
    pub fn new(op: &dyn LinearOperator) -> SolverResult<Self> {
        Self::from_diagonal(op.diagonal())
    }

    pub fn from_diagonal(diag: DVector<f64>) -> SolverResult<Self> {
        if let Some(i) = diag.iter().position(|d| *d == 0.0 || !d.is_finite()) {
            return Err(SolverError::InvalidState {
                what: format!("zero or non-finite diagonal entry at row {i}"),
            });
        }
        Ok(Self {
            inv_diag: diag.map(|d| 1.0 / d),
        })
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        z.copy_from(r);
        z.component_mul_assign(&self.inv_diag);
    }
}

/// Symmetric Gauss-Seidel smoother on an assembled matrix, applied from a
/// zero initial guess. Symmetric for symmetric `A`, so it is usable with PCG.
#[derive(Clone, Debug)]
pub struct GaussSeidelSmoother {
    matrix: CsrMatrix<f64>,
    diag: DVector<f64>,
}

impl GaussSeidelSmoother {
    pub fn new(a: &CsrMatrix<f64>) -> SolverResult<Self> {
        let diag = LinearOperator::diagonal(a);
        if let Some(i) = diag.iter().position(|d| *d == 0.0 || !d.is_finite()) {
            return Err(SolverError::InvalidState {
                what: format!("Gauss-Seidel needs a non-zero diagonal (row {i})"),
            });
        }
        Ok(Self {
            matrix: a.clone(),
            diag,
        })
    }

    fn relax_row(&self, i: usize, r: &DVector<f64>, z: &mut DVector<f64>) {
        let offsets = self.matrix.row_offsets();
        let cols = self.matrix.col_indices();
        let vals = self.matrix.values();
        let mut sum = r[i];
        for k in offsets[i]..offsets[i + 1] {
            let j = cols[k];
            if j != i {
                sum -= vals[k] * z[j];
            }
        }
        z[i] = sum / self.diag[i];
    }
}

impl Preconditioner for GaussSeidelSmoother {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        z.fill(0.0);
        let n = r.len();
        for i in 0..n {
            self.relax_row(i, r, z);
        }
        for i in (0..n).rev() {
            self.relax_row(i, r, z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn jacobi_inverts_diagonal_matrix() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 2.0);
        coo.push(1, 1, 4.0);
        coo.push(2, 2, 0.5);
        let a = CsrMatrix::from(&coo);
        let pc = JacobiPreconditioner::new(&a).unwrap();
        let r = DVector::from_vec(vec![2.0, 2.0, 2.0]);
        let mut z = DVector::zeros(3);
        pc.apply(&r, &mut z);
        assert_eq!(z, DVector::from_vec(vec![1.0, 0.5, 4.0]));
    }

    #[test]
    fn gauss_seidel_is_exact_for_triangular_systems() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 2.0);
        coo.push(1, 0, 1.0);
        coo.push(1, 1, 1.0);
        let a = CsrMatrix::from(&coo);
        let gs = GaussSeidelSmoother::new(&a).unwrap();
        let r = DVector::from_vec(vec![2.0, 3.0]);
        let mut z = DVector::zeros(2);
        gs.apply(&r, &mut z);
        assert!((z[0] - 1.0).abs() < 1e-14);
        assert!((z[1] - 2.0).abs() < 1e-14);
    }

    #[test]
    fn zero_diagonal_is_rejected() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 1, 1.0);
        coo.push(1, 0, 1.0);
        let a = CsrMatrix::from(&coo);
        assert!(GaussSeidelSmoother::new(&a).is_err());
        assert!(JacobiPreconditioner::new(&a).is_err());
    }
}
