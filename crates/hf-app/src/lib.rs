//! Shared application service layer for heatflow.
//!
//! Turns a run configuration into a mesh, a discretization and a solve, and
//! reports the outcome. The CLI is a thin shell over this crate.

pub mod config;
pub mod elliptic_service;
pub mod error;
pub mod heat_service;
pub mod progress;
pub mod timing;

// Re-export key types for convenience
pub use config::{
    AssemblyMode, EllipticConfig, HeatConfig, LinearSolverKind, VisualizationConfig, load_config,
    save_config,
};
pub use elliptic_service::{EllipticReport, LevelReport, run_elliptic, run_elliptic_with_progress};
pub use error::{AppError, AppResult};
pub use heat_service::{HeatReport, run_heat, run_heat_with_progress};
pub use progress::{LevelProgress, ProgressCallback, RunProgressEvent, RunStage, TransientProgress};
pub use timing::{RunTimingSummary, phase_breakdown};
