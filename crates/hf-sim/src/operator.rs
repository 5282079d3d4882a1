//! Operator traits at the seam between time stepping and discretization.

use std::sync::Arc;

use hf_fem::{BilinearForm, LinearForm};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::error::SimResult;

/// `du/dt = F(u, t)` as seen by a time integrator.
pub trait TimeDependentOperator {
    fn size(&self) -> usize;

    /// Time the operator is currently evaluated at.
    fn time(&self) -> f64;

    fn set_time(&mut self, t: f64) -> SimResult<()>;

    /// Explicit evaluation `y = F(x, t)`.
    fn mult(&mut self, x: &DVector<f64>) -> SimResult<DVector<f64>>;

    /// Solve for `k = F(x + dt k, t)`.
    fn implicit_solve(&mut self, dt: f64, x: &DVector<f64>) -> SimResult<DVector<f64>>;
}

/// Square spatial operator that can be (re)assembled at a given time.
pub trait SpatialOperator {
    fn size(&self) -> usize;

    /// Assemble and finalize at time `t`.
    fn assemble(&mut self, t: f64) -> SimResult<()>;

    fn matrix(&self) -> SimResult<&Arc<CsrMatrix<f64>>>;

    /// Changes whenever `matrix` would return a different matrix.
    fn generation(&self) -> u64;
}

/// Time-dependent right-hand side vector.
pub trait SourceVector {
    fn size(&self) -> usize;

    fn assemble(&mut self, t: f64) -> SimResult<()>;

    fn vector(&self) -> &DVector<f64>;
}

impl SpatialOperator for BilinearForm {
    fn size(&self) -> usize {
        BilinearForm::size(self)
    }

    fn assemble(&mut self, t: f64) -> SimResult<()> {
        Ok(BilinearForm::assemble(self, t)?)
    }

    fn matrix(&self) -> SimResult<&Arc<CsrMatrix<f64>>> {
        Ok(BilinearForm::matrix(self)?)
    }

    fn generation(&self) -> u64 {
        BilinearForm::generation(self)
    }
}

impl SourceVector for LinearForm {
    fn size(&self) -> usize {
        LinearForm::size(self)
    }

    fn assemble(&mut self, t: f64) -> SimResult<()> {
        LinearForm::assemble(self, t);
        Ok(())
    }

    fn vector(&self) -> &DVector<f64> {
        LinearForm::vector(self)
    }
}
