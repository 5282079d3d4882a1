//! Stateful linear solvers bound to one assembled matrix.
//!
//! A solver is configured once, then bound with `set_operator` and reused for
//! any number of right-hand sides. Rebinding replaces the preconditioner or
//! factorization built for the previous matrix.

use std::sync::Arc;

use hf_core::timing::{Timer, phase_timing};
use nalgebra::DVector;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

use crate::error::{SolverError, SolverResult};
use crate::krylov::{SolveStats, SolverConfig, conjugate_gradient, gmres};
use crate::preconditioner::{Preconditioner, PreconditionerKind};

/// Linear solver collaborator: bind a matrix, then solve repeatedly.
pub trait LinearSolver {
    /// Bind the matrix to solve with, rebuilding any preconditioner or
    /// factorization.
    fn set_operator(&mut self, matrix: Arc<CsrMatrix<f64>>) -> SolverResult<()>;

    fn set_tolerances(&mut self, rel_tol: f64, abs_tol: f64, max_iter: usize);

    /// Solve `A x = rhs` with the bound matrix.
    fn solve(&mut self, rhs: &DVector<f64>, x: &mut DVector<f64>) -> SolverResult<SolveStats>;

    /// Size of the bound matrix, if any.
    fn size(&self) -> Option<usize>;

    fn name(&self) -> &'static str;
}

/// Krylov method used by [`IterativeSolver`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KrylovMethod {
    #[default]
    Cg,
    Gmres,
}

/// CG or GMRES with an optional preconditioner built on each bind.
pub struct IterativeSolver {
    method: KrylovMethod,
    preconditioner_kind: PreconditionerKind,
    config: SolverConfig,
    matrix: Option<Arc<CsrMatrix<f64>>>,
    preconditioner: Option<Box<dyn Preconditioner>>,
}

impl IterativeSolver {
    pub fn new(method: KrylovMethod, preconditioner: PreconditionerKind, config: SolverConfig) -> Self {
        Self {
            method,
            preconditioner_kind: preconditioner,
            config,
            matrix: None,
            preconditioner: None,
        }
    }

    /// Plain CG with the given config.
    pub fn cg(config: SolverConfig) -> Self {
        Self::new(KrylovMethod::Cg, PreconditionerKind::None, config)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    pub fn method(&self) -> KrylovMethod {
        self.method
    }
}

impl LinearSolver for IterativeSolver {
    fn set_operator(&mut self, matrix: Arc<CsrMatrix<f64>>) -> SolverResult<()> {
        if matrix.nrows() != matrix.ncols() {
            return Err(SolverError::DimensionMismatch {
                what: "square operator",
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }
        self.preconditioner = Some(self.preconditioner_kind.build(&matrix)?);
        self.matrix = Some(matrix);
        Ok(())
    }

    fn set_tolerances(&mut self, rel_tol: f64, abs_tol: f64, max_iter: usize) {
        self.config.rel_tol = rel_tol;
        self.config.abs_tol = abs_tol;
        self.config.max_iter = max_iter;
    }

    fn solve(&mut self, rhs: &DVector<f64>, x: &mut DVector<f64>) -> SolverResult<SolveStats> {
        let (Some(matrix), Some(pc)) = (self.matrix.as_deref(), self.preconditioner.as_deref())
        else {
            return Err(SolverError::NotBound);
        };
        let timer = Timer::start("linear solve");
        let stats = match self.method {
            KrylovMethod::Cg => conjugate_gradient(matrix, pc, rhs, x, &self.config),
            KrylovMethod::Gmres => gmres(matrix, pc, rhs, x, &self.config),
        };
        timer.stop_into(&phase_timing::LINEAR_SOLVES);
        stats
    }

    fn size(&self) -> Option<usize> {
        self.matrix.as_ref().map(|m| m.nrows())
    }

    fn name(&self) -> &'static str {
        match (self.method, self.preconditioner_kind) {
            (KrylovMethod::Cg, PreconditionerKind::None) => "CG",
            (KrylovMethod::Cg, _) => "PCG",
            (KrylovMethod::Gmres, _) => "GMRES",
        }
    }
}

/// Sparse Cholesky factorization for symmetric positive definite matrices.
/// Factoring happens in `set_operator`; every solve is a pair of triangular
/// solves.
#[derive(Default)]
pub struct CholeskySolver {
    factor: Option<CscCholesky<f64>>,
    n: usize,
}

impl CholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinearSolver for CholeskySolver {
    fn set_operator(&mut self, matrix: Arc<CsrMatrix<f64>>) -> SolverResult<()> {
        let csc = CscMatrix::from(matrix.as_ref());
        let factor = CscCholesky::factor(&csc).map_err(|e| SolverError::Factorization {
            what: format!("{e:?}"),
        })?;
        self.n = matrix.nrows();
        self.factor = Some(factor);
        Ok(())
    }

    fn set_tolerances(&mut self, _rel_tol: f64, _abs_tol: f64, _max_iter: usize) {}

    fn solve(&mut self, rhs: &DVector<f64>, x: &mut DVector<f64>) -> SolverResult<SolveStats> {
        let factor = self.factor.as_ref().ok_or(SolverError::NotBound)?;
        if rhs.len() != self.n {
            return Err(SolverError::DimensionMismatch {
                what: "right-hand side",
                expected: self.n,
                actual: rhs.len(),
            });
        }
        let timer = Timer::start("cholesky solve");
        let solution = factor.solve(rhs);
        timer.stop_into(&phase_timing::LINEAR_SOLVES);
        x.copy_from(&solution.column(0));
        Ok(SolveStats {
            iterations: 1,
            residual_norm: 0.0,
            initial_residual_norm: rhs.norm(),
            converged: true,
        })
    }

    fn size(&self) -> Option<usize> {
        self.factor.as_ref().map(|_| self.n)
    }

    fn name(&self) -> &'static str {
        "Cholesky"
    }
}
