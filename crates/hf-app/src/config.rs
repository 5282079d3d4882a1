//! Run configuration for the heat and elliptic services.
//!
//! Both configs deserialize with every field optional; missing fields take
//! the defaults of the reference runs. Files ending in `.json` are read as
//! JSON, anything else as YAML.

use std::path::{Path, PathBuf};

use hf_fem::AssemblyLevel;
use hf_fem::space::MAX_ORDER;
use hf_output::glvis::{DEFAULT_HOST, DEFAULT_PORT};
use hf_sim::IntegratorType;
use hf_solver::{CholeskySolver, IterativeSolver, KrylovMethod, LinearSolver, PreconditionerKind, SolverConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Linear solver used inside the time-stepping operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    /// Unpreconditioned CG, rel/abs tolerance 1e-10.
    #[default]
    Cg,
    /// CG with symmetric Gauss-Seidel.
    Pcg,
    /// Sparse Cholesky, factored once per bound matrix.
    Cholesky,
}

impl LinearSolverKind {
    pub fn build(self) -> Box<dyn LinearSolver> {
        let config = SolverConfig {
            rel_tol: 1e-10,
            abs_tol: 1e-10,
            max_iter: 1_000_000,
            ..SolverConfig::default()
        };
        match self {
            LinearSolverKind::Cg => Box::new(IterativeSolver::cg(config)),
            LinearSolverKind::Pcg => Box::new(IterativeSolver::new(
                KrylovMethod::Cg,
                PreconditionerKind::GaussSeidel,
                config,
            )),
            LinearSolverKind::Cholesky => Box::new(CholeskySolver::new()),
        }
    }
}

/// Where the solution is shown or written while the run is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Stream frames to a GLVis server
    pub glvis: bool,
    pub host: String,
    pub port: u16,
    /// Send a frame every N time steps (heat runs only)
    pub every: usize,
    /// Write a ParaView collection under this directory
    pub paraview_dir: Option<PathBuf>,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            glvis: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            every: 5,
            paraview_dir: None,
        }
    }
}

impl VisualizationConfig {
    fn validate(&self) -> AppResult<()> {
        if self.every == 0 {
            return Err(AppError::Config(
                "visualization.every must be at least 1".to_string(),
            ));
        }
        if self.glvis && self.host.trim().is_empty() {
            return Err(AppError::Config("visualization.host is empty".to_string()));
        }
        Ok(())
    }
}

/// Manufactured heat problem on the unit square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    pub order: usize,
    /// Cells per direction before refinement
    pub base_mesh: [usize; 2],
    /// Uniform refinements applied to the base mesh
    pub refinements: usize,
    pub dt: f64,
    pub t_final: f64,
    /// Integrator id (1-4 explicit RK, 11-13 and 21-23 implicit)
    pub integrator: u32,
    /// Reassemble stiffness and mass at every stage
    pub time_dependent: bool,
    pub linear_solver: LinearSolverKind,
    pub visualization: VisualizationConfig,
    /// Directory for the run manifest
    pub output_dir: Option<PathBuf>,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            order: 1,
            base_mesh: [2, 2],
            refinements: 1,
            dt: 1e-5,
            t_final: 1.0,
            integrator: IntegratorType::default().id(),
            time_dependent: false,
            linear_solver: LinearSolverKind::default(),
            visualization: VisualizationConfig::default(),
            output_dir: None,
        }
    }
}

impl HeatConfig {
    pub fn validate(&self) -> AppResult<()> {
        validate_order(self.order)?;
        validate_mesh(self.base_mesh)?;
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(AppError::Config(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if !(self.t_final >= 0.0 && self.t_final.is_finite()) {
            return Err(AppError::Config(format!(
                "t_final must be non-negative and finite, got {}",
                self.t_final
            )));
        }
        self.integrator_type()?;
        self.visualization.validate()
    }

    pub fn integrator_type(&self) -> AppResult<IntegratorType> {
        Ok(IntegratorType::from_id(self.integrator)?)
    }
}

/// How the elliptic operator is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMode {
    #[default]
    Full,
    Partial,
}

impl From<AssemblyMode> for AssemblyLevel {
    fn from(mode: AssemblyMode) -> Self {
        match mode {
            AssemblyMode::Full => AssemblyLevel::Full,
            AssemblyMode::Partial => AssemblyLevel::Partial,
        }
    }
}

/// Convection-diffusion problem `-eps Δu + b·∇u = f` with homogeneous
/// Dirichlet data, solved on a sequence of refined meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipticConfig {
    pub order: usize,
    pub base_mesh: [usize; 2],
    /// Number of refinement levels; each one refines before solving
    pub levels: usize,
    pub eps: f64,
    /// Convection velocity `(bx, by)`
    pub convection: [f64; 2],
    pub assembly: AssemblyMode,
    pub static_condensation: bool,
    pub visualization: VisualizationConfig,
    pub output_dir: Option<PathBuf>,
    /// Write the final mesh and solution in MFEM format here
    pub save_dir: Option<PathBuf>,
}

impl Default for EllipticConfig {
    fn default() -> Self {
        Self {
            order: 1,
            base_mesh: [4, 4],
            levels: 4,
            eps: 1.0,
            convection: [0.0, 0.0],
            assembly: AssemblyMode::Full,
            static_condensation: false,
            visualization: VisualizationConfig::default(),
            output_dir: None,
            save_dir: None,
        }
    }
}

impl EllipticConfig {
    pub fn validate(&self) -> AppResult<()> {
        validate_order(self.order)?;
        validate_mesh(self.base_mesh)?;
        if self.levels == 0 {
            return Err(AppError::Config("levels must be at least 1".to_string()));
        }
        if !(self.eps > 0.0 && self.eps.is_finite()) {
            return Err(AppError::Config(format!(
                "eps must be positive and finite, got {}",
                self.eps
            )));
        }
        if self.convection.iter().any(|b| !b.is_finite()) {
            return Err(AppError::Config("convection must be finite".to_string()));
        }
        if self.static_condensation && self.assembly == AssemblyMode::Partial {
            return Err(AppError::Config(
                "static condensation requires full assembly".to_string(),
            ));
        }
        self.visualization.validate()
    }

    pub fn is_symmetric(&self) -> bool {
        self.convection[0] * self.convection[0] + self.convection[1] * self.convection[1] == 0.0
    }
}

fn validate_order(order: usize) -> AppResult<()> {
    if order == 0 || order > MAX_ORDER {
        return Err(AppError::Config(format!(
            "order must be between 1 and {MAX_ORDER}, got {order}"
        )));
    }
    Ok(())
}

fn validate_mesh(base_mesh: [usize; 2]) -> AppResult<()> {
    if base_mesh.contains(&0) {
        return Err(AppError::Config(format!(
            "base_mesh needs at least one cell per direction, got {base_mesh:?}"
        )));
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load a config from YAML or JSON, chosen by file extension. The result is
/// not validated; callers validate after applying overrides.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    if is_json(path) {
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config JSON: {}", e)))
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))
    }
}

/// Save a config as YAML or JSON, chosen by file extension.
pub fn save_config<T: Serialize>(path: &Path, config: &T) -> AppResult<()> {
    let content = if is_json(path) {
        serde_json::to_string_pretty(config)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_yaml::to_string(config)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?
    };
    std::fs::write(path, content).map_err(|e| AppError::ConfigFileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
