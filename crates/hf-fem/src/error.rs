//! Error types for discretization operations.

use hf_mesh::MeshError;
use hf_solver::SolverError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FemError {
    #[error("Unsupported polynomial order {order} (supported: 1..={max})")]
    InvalidOrder { order: usize, max: usize },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} has not been assembled")]
    NotAssembled { what: &'static str },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: &'static str },

    #[error("Essential dof {dof} is interior to an element and cannot be condensed")]
    InteriorEssentialDof { dof: usize },

    #[error("Singular element block in static condensation (element {element})")]
    SingularElement { element: usize },

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}

pub type FemResult<T> = Result<T, FemError>;
