//! Error types for linear solver operations.

use thiserror::Error;

/// Errors that can occur while setting up or running a linear solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("{method} did not converge: {iterations} iterations, residual = {residual:e}")]
    ConvergenceFailed {
        method: &'static str,
        iterations: usize,
        residual: f64,
    },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Solver has no operator bound")]
    NotBound,

    #[error("Invalid state: {what}")]
    InvalidState { what: String },

    #[error("Factorization failed: {what}")]
    Factorization { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;
