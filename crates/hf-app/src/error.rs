//! Error types for the hf-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates so the
/// CLI can report every failure the same way.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file: {path}")]
    ConfigFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Discretization error: {0}")]
    Fem(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hf-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<hf_mesh::MeshError> for AppError {
    fn from(err: hf_mesh::MeshError) -> Self {
        AppError::Mesh(err.to_string())
    }
}

impl From<hf_fem::FemError> for AppError {
    fn from(err: hf_fem::FemError) -> Self {
        AppError::Fem(err.to_string())
    }
}

impl From<hf_solver::SolverError> for AppError {
    fn from(err: hf_solver::SolverError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<hf_sim::SimError> for AppError {
    fn from(err: hf_sim::SimError) -> Self {
        match err {
            hf_sim::SimError::InvalidArg { what } => AppError::Config(what.to_string()),
            e @ hf_sim::SimError::UnknownIntegrator { .. } => AppError::Config(e.to_string()),
            other => AppError::Simulation(other.to_string()),
        }
    }
}

impl From<hf_output::OutputError> for AppError {
    fn from(err: hf_output::OutputError) -> Self {
        AppError::Output(err.to_string())
    }
}
