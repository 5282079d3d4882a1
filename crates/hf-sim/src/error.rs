//! Error types for time integration.

use hf_fem::FemError;
use hf_solver::SolverError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid state: {what}")]
    InvalidState { what: String },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown integrator id {id}")]
    UnknownIntegrator { id: u32 },

    #[error("Linear solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Discretization error: {0}")]
    Fem(#[from] FemError),
}

pub type SimResult<T> = Result<T, SimError>;
