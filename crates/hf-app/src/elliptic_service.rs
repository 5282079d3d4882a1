//! Steady convection-diffusion on a sequence of uniformly refined meshes.
//!
//! Every level refines the mesh first, then assembles, eliminates the
//! Dirichlet dofs, solves and measures the L2 error against
//! `u = sin(πx) sin(πy)`.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hf_fem::{
    BilinearForm, ConstantCoefficient, ConstantVectorCoefficient, ConvectionIntegrator,
    DiffusionIntegrator, DomainLoadIntegrator, FiniteElementSpace, FunctionCoefficient,
    GridFunction, LinearForm, LinearSystem,
};
use hf_mesh::BoundaryMarker;
use hf_output::{GlvisStream, ParaViewCollection, RunKind, RunManifest, compute_run_id, write_manifest};
use hf_solver::{
    GaussSeidelSmoother, JacobiPreconditioner, SolveStats, SolverConfig, conjugate_gradient, gmres,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AssemblyMode, EllipticConfig};
use crate::error::{AppError, AppResult};
use crate::heat_service::{build_mesh, levels_of_detail};
use crate::progress::{LevelProgress, ProgressCallback, RunStage, emit_progress};
use crate::timing::{self, RunTimingSummary};

pub const ELLIPTIC_COLLECTION: &str = "Ex1-Modified";

/// Result of one refinement level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    /// 1-based
    pub level: usize,
    pub elements: usize,
    pub dofs: usize,
    /// Unknowns after eliminating essential (and condensed) dofs
    pub reduced_size: usize,
    pub iterations: usize,
    pub converged: bool,
    pub l2_error: f64,
}

#[derive(Debug, Clone)]
pub struct EllipticReport {
    pub run_id: String,
    pub levels: Vec<LevelReport>,
    pub timing: RunTimingSummary,
    pub manifest_path: Option<PathBuf>,
    pub paraview_path: Option<PathBuf>,
    /// Mesh and solution files, when `save_dir` is set
    pub saved: Option<(PathBuf, PathBuf)>,
}

impl EllipticReport {
    pub fn final_level(&self) -> Option<&LevelReport> {
        self.levels.last()
    }
}

fn exact_solution() -> FunctionCoefficient {
    FunctionCoefficient::time_independent(|x| (PI * x[0]).sin() * (PI * x[1]).sin())
}

/// `-eps Δu + b·∇u` applied to the exact solution.
fn source(eps: f64, b: [f64; 2]) -> FunctionCoefficient {
    FunctionCoefficient::time_independent(move |x| {
        let (sx, cx) = (PI * x[0]).sin_cos();
        let (sy, cy) = (PI * x[1]).sin_cos();
        eps * 2.0 * PI * PI * sx * sy + PI * (b[0] * cx * sy + b[1] * sx * cy)
    })
}

/// Run every refinement level of the elliptic problem.
pub fn run_elliptic(config: &EllipticConfig) -> AppResult<EllipticReport> {
    run_elliptic_with_progress(config, None)
}

/// Run the elliptic problem and stream progress events.
pub fn run_elliptic_with_progress(
    config: &EllipticConfig,
    mut progress_cb: ProgressCallback<'_>,
) -> AppResult<EllipticReport> {
    config.validate()?;
    timing::begin_run();
    let started = Instant::now();
    let run_id = compute_run_id(config, "elliptic", env!("CARGO_PKG_VERSION"))?;

    emit_progress(&mut progress_cb, RunStage::BuildingMesh, started, None, None, None);
    let mut mesh = build_mesh(config.base_mesh, 0)?;
    let exact = exact_solution();

    let mut levels = Vec::with_capacity(config.levels);
    let mut last: Option<GridFunction> = None;
    for level in 1..=config.levels {
        mesh.uniform_refinement();
        let space = Arc::new(FiniteElementSpace::new(Arc::new(mesh.clone()), config.order)?);
        let (report, solution) = solve_level(config, level, &space, &exact)?;
        info!(
            level,
            dofs = report.dofs,
            reduced = report.reduced_size,
            iterations = report.iterations,
            l2_error = report.l2_error,
            "level solved"
        );
        emit_progress(
            &mut progress_cb,
            RunStage::SolvingLevel,
            started,
            None,
            None,
            Some(LevelProgress {
                level,
                levels: config.levels,
                dofs: report.dofs,
                l2_error: Some(report.l2_error),
            }),
        );
        levels.push(report);
        last = Some(solution);
    }
    let solution = last.ok_or_else(|| AppError::Config("levels must be at least 1".to_string()))?;

    let mut paraview_path = None;
    let vis = &config.visualization;
    if vis.glvis || vis.paraview_dir.is_some() {
        emit_progress(&mut progress_cb, RunStage::Visualizing, started, None, None, None);
    }
    if vis.glvis {
        let mut glvis = GlvisStream::connect(&vis.host, vis.port);
        glvis.append(solution.space().mesh(), &solution, "u");
    }
    if let Some(dir) = &vis.paraview_dir {
        let mut pv = ParaViewCollection::new(ELLIPTIC_COLLECTION, dir.clone());
        pv.set_levels_of_detail(levels_of_detail(config.order));
        pv.set_cycle(0);
        pv.set_time(0.0);
        pv.register_field("u", solution.values().clone());
        pv.save(solution.space())?;
        paraview_path = Some(pv.pvd_path());
    }

    let mut saved = None;
    let mut manifest_path = None;
    if config.save_dir.is_some() || config.output_dir.is_some() {
        emit_progress(&mut progress_cb, RunStage::SavingResults, started, None, None, None);
    }
    if let Some(dir) = &config.save_dir {
        let mesh = solution.space().mesh();
        saved = Some(hf_output::mfem::save_solution(dir, mesh, &solution.values_at_vertices())?);
    }
    if let Some(dir) = &config.output_dir {
        let finest = levels.last();
        let manifest = RunManifest::new(
            run_id.clone(),
            env!("CARGO_PKG_VERSION"),
            RunKind::Elliptic {
                levels: levels.len(),
            },
            finest.map_or(0, |r| r.dofs),
            finest.map(|r| r.l2_error),
        );
        manifest_path = Some(write_manifest(dir, &manifest)?);
    }

    let timing = RunTimingSummary::collect(started.elapsed().as_secs_f64());
    emit_progress(&mut progress_cb, RunStage::Completed, started, None, None, None);
    Ok(EllipticReport {
        run_id,
        levels,
        timing,
        manifest_path,
        paraview_path,
        saved,
    })
}

fn solve_level(
    config: &EllipticConfig,
    level: usize,
    space: &Arc<FiniteElementSpace>,
    exact: &FunctionCoefficient,
) -> AppResult<(LevelReport, GridFunction)> {
    let mesh = space.mesh();
    let marker = BoundaryMarker::all(mesh);
    let ess = space.essential_dofs(&marker);

    let mut b = LinearForm::new(space.clone());
    b.add_domain_integrator(DomainLoadIntegrator::new(source(config.eps, config.convection)));
    b.assemble(0.0);

    let mut a = BilinearForm::new(space.clone());
    a.set_assembly_level(config.assembly.into());
    a.add_domain_integrator(DiffusionIntegrator::new(ConstantCoefficient(config.eps)));
    if !config.is_symmetric() {
        let [bx, by] = config.convection;
        a.add_domain_integrator(ConvectionIntegrator::new(ConstantVectorCoefficient::new(bx, by)));
    }
    if config.static_condensation {
        a.enable_static_condensation();
    }
    a.assemble(0.0)?;

    let mut x = GridFunction::new(space.clone());
    x.project_boundary_coefficient(exact, &marker, 0.0);
    let system = a.form_linear_system(&ess, x.values(), b.vector())?;

    let mut reduced = system.initial_guess();
    let stats = solve_system(&system, config, &mut reduced)?;
    let full = a.recover_solution(&system, &reduced)?;
    let solution = GridFunction::from_values(space.clone(), full)?;

    let report = LevelReport {
        level,
        elements: space.num_elements(),
        dofs: space.ndofs(),
        reduced_size: system.size(),
        iterations: stats.iterations,
        converged: stats.converged,
        l2_error: solution.l2_error(exact, 0.0),
    };
    Ok((report, solution))
}

/// Krylov solve of the reduced system. Full assembly uses a symmetric
/// Gauss-Seidel preconditioner, partial assembly only has the diagonal.
/// Non-convergence is reported in the stats, not raised.
fn solve_system(
    system: &LinearSystem,
    config: &EllipticConfig,
    x: &mut DVector<f64>,
) -> AppResult<SolveStats> {
    let symmetric = config.is_symmetric();
    let op = system.operator();
    let stats = match (config.assembly, system.matrix()) {
        (AssemblyMode::Full, Some(matrix)) => {
            let gs = GaussSeidelSmoother::new(matrix)?;
            if symmetric {
                conjugate_gradient(op, &gs, system.rhs(), x, &krylov_config(2000, 0.0))?
            } else {
                gmres(op, &gs, system.rhs(), x, &krylov_config(3000, 1e-12))?
            }
        }
        _ => {
            let jacobi = JacobiPreconditioner::new(op)?;
            if symmetric {
                conjugate_gradient(op, &jacobi, system.rhs(), x, &krylov_config(400, 0.0))?
            } else {
                gmres(op, &jacobi, system.rhs(), x, &krylov_config(400, 1e-12))?
            }
        }
    };
    Ok(stats)
}

fn krylov_config(max_iter: usize, abs_tol: f64) -> SolverConfig {
    SolverConfig {
        rel_tol: 1e-6,
        abs_tol,
        max_iter,
        restart: 50,
        iterative_mode: false,
        strict: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_fem::Coefficient;
    use nalgebra::Point2;

    #[test]
    fn source_matches_operator_applied_to_exact_solution() {
        // -eps Δu + b·∇u by central differences at an interior point.
        let (eps, b) = (0.7, [1.5, -0.5]);
        let u = exact_solution();
        let f = source(eps, b);
        let p = Point2::new(0.3, 0.6);
        let h = 1e-4;
        let at = |dx: f64, dy: f64| u.eval(&Point2::new(p[0] + dx, p[1] + dy), 0.0);
        let lap = (at(h, 0.0) + at(-h, 0.0) + at(0.0, h) + at(0.0, -h) - 4.0 * at(0.0, 0.0)) / (h * h);
        let ux = (at(h, 0.0) - at(-h, 0.0)) / (2.0 * h);
        let uy = (at(0.0, h) - at(0.0, -h)) / (2.0 * h);
        let expected = -eps * lap + b[0] * ux + b[1] * uy;
        assert!((f.eval(&p, 0.0) - expected).abs() < 1e-4);
    }
}
