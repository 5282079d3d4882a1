//! Linear solvers for assembled finite element systems.
//!
//! This crate provides the operator abstraction shared by assembled (CSR) and
//! matrix-free operators, the Krylov methods that act on it (CG, GMRES), the
//! smoothers used as preconditioners, and stateful solvers that stay bound to
//! one sparse matrix across many right-hand sides.

pub mod error;
pub mod krylov;
pub mod operator;
pub mod preconditioner;
pub mod solver;

pub use error::{SolverError, SolverResult};
pub use krylov::{SolveStats, SolverConfig, conjugate_gradient, gmres};
pub use operator::{LinearOperator, restrict, sparse_add, spmv_add};
pub use preconditioner::{
    GaussSeidelSmoother, IdentityPreconditioner, JacobiPreconditioner, Preconditioner,
    PreconditionerKind,
};
pub use solver::{CholeskySolver, IterativeSolver, KrylovMethod, LinearSolver};
