//! Heat equation runs: build the discretization, integrate in time, report.
//!
//! The problem is manufactured so the error can be measured:
//! `u = sin(5t) cos(πx) cos(πy)` on the unit square with natural boundary
//! conditions, zero initial data and the matching heat source.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hf_fem::{
    BilinearForm, ConstantCoefficient, DiffusionIntegrator, DomainLoadIntegrator,
    FiniteElementSpace, FunctionCoefficient, GridFunction, LinearForm, MassIntegrator,
};
use hf_mesh::{CartesianMeshBuilder, Mesh};
use hf_output::{GlvisStream, ParaViewCollection, RunKind, RunManifest, compute_run_id, write_manifest};
use hf_sim::{
    IntegratorType, OperatorStats, ParabolicOperator, SimOptions, SimSummary, StepObserver,
    StepReport, run_sim,
};
use nalgebra::DVector;
use tracing::{info, warn};

use crate::config::HeatConfig;
use crate::error::{AppError, AppResult};
use crate::progress::{ProgressCallback, RunStage, TransientProgress, emit_progress};
use crate::timing::{self, RunTimingSummary};

pub const HEAT_COLLECTION: &str = "Heat";

/// Outcome of a heat run.
#[derive(Debug, Clone)]
pub struct HeatReport {
    pub run_id: String,
    pub integrator: IntegratorType,
    pub dofs: usize,
    pub steps: usize,
    pub t_final: f64,
    pub l2_error: f64,
    pub operator_stats: OperatorStats,
    pub timing: RunTimingSummary,
    pub manifest_path: Option<PathBuf>,
    pub paraview_path: Option<PathBuf>,
}

fn exact_solution() -> FunctionCoefficient {
    FunctionCoefficient::new(|x, t| (5.0 * t).sin() * (PI * x[0]).cos() * (PI * x[1]).cos())
}

fn heat_source() -> FunctionCoefficient {
    FunctionCoefficient::new(|x, t| {
        (2.0 * PI * PI * (5.0 * t).sin() + 5.0 * (5.0 * t).cos())
            * (PI * x[0]).cos()
            * (PI * x[1]).cos()
    })
}

pub(crate) fn build_mesh(base: [usize; 2], refinements: usize) -> AppResult<Mesh> {
    let mut mesh = CartesianMeshBuilder::new(base[0], base[1]).build()?;
    for _ in 0..refinements {
        mesh.uniform_refinement();
    }
    Ok(mesh)
}

/// ParaView sub-sampling: linear fields are exact on the cells, higher
/// orders get `order + 3` sub-cells per edge.
pub(crate) fn levels_of_detail(order: usize) -> usize {
    if order == 1 { 1 } else { order + 3 }
}

/// Run the heat problem described by `config`.
pub fn run_heat(config: &HeatConfig) -> AppResult<HeatReport> {
    run_heat_with_progress(config, None)
}

/// Run the heat problem and stream progress events.
pub fn run_heat_with_progress(
    config: &HeatConfig,
    mut progress_cb: ProgressCallback<'_>,
) -> AppResult<HeatReport> {
    config.validate()?;
    let integrator = config.integrator_type()?;
    timing::begin_run();
    let started = Instant::now();
    let run_id = compute_run_id(config, "heat", env!("CARGO_PKG_VERSION"))?;

    emit_progress(&mut progress_cb, RunStage::BuildingMesh, started, None, None, None);
    let mesh = Arc::new(build_mesh(config.base_mesh, config.refinements)?);
    let space = Arc::new(FiniteElementSpace::new(mesh, config.order)?);
    info!(
        order = config.order,
        elements = space.num_elements(),
        dofs = space.ndofs(),
        "heat discretization ready"
    );

    emit_progress(
        &mut progress_cb,
        RunStage::AssemblingOperators,
        started,
        Some(format!("{} dofs", space.ndofs())),
        None,
        None,
    );
    let mut stiffness = BilinearForm::new(space.clone());
    stiffness.add_domain_integrator(DiffusionIntegrator::new(ConstantCoefficient(1.0)));
    let mut mass = BilinearForm::new(space.clone());
    mass.add_domain_integrator(MassIntegrator::new(ConstantCoefficient(1.0)));
    let mut load = LinearForm::new(space.clone());
    load.add_domain_integrator(DomainLoadIntegrator::new(heat_source()));

    let solver_kind = config.linear_solver;
    let mut op = ParabolicOperator::new(stiffness, mass, load)?
        .time_dependent(config.time_dependent)
        .with_solver_factory(Box::new(move || solver_kind.build()));

    let exact = exact_solution();
    let mut u = GridFunction::new(space.clone());
    u.project_coefficient(&exact, 0.0);
    let mut x = u.into_values();

    let opts = SimOptions {
        dt: config.dt,
        t_start: 0.0,
        t_final: config.t_final,
        integrator,
        report_every: config.visualization.every,
        ..SimOptions::default()
    };

    emit_progress(
        &mut progress_cb,
        RunStage::RunningTransient,
        started,
        Some(integrator.to_string()),
        None,
        None,
    );
    let (summary, paraview_path) = {
        let mut observer = HeatObserver::new(config, space.clone(), &mut progress_cb, started);
        let summary = run_sim(&mut op, &mut x, &opts, &mut observer)?;
        observer.finish()?;
        (summary, observer.paraview.map(|pv| pv.pvd_path()))
    };

    let u = GridFunction::from_values(space.clone(), x)?;
    let l2_error = u.l2_error(&exact, summary.t_final);
    let operator_stats = *op.stats();
    info!(
        steps = summary.steps,
        t_final = summary.t_final,
        l2_error,
        combined_builds = operator_stats.combined_builds,
        "heat run finished"
    );

    let manifest_path = match &config.output_dir {
        Some(dir) => {
            emit_progress(&mut progress_cb, RunStage::SavingResults, started, None, None, None);
            let manifest = RunManifest::new(
                run_id.clone(),
                env!("CARGO_PKG_VERSION"),
                heat_kind(config, &summary),
                space.ndofs(),
                Some(l2_error),
            );
            Some(write_manifest(dir, &manifest)?)
        }
        None => None,
    };

    let timing = RunTimingSummary::collect(started.elapsed().as_secs_f64());
    emit_progress(
        &mut progress_cb,
        RunStage::Completed,
        started,
        Some(format!("L2 error {l2_error:e}")),
        None,
        None,
    );

    Ok(HeatReport {
        run_id,
        integrator,
        dofs: space.ndofs(),
        steps: summary.steps,
        t_final: summary.t_final,
        l2_error,
        operator_stats,
        timing,
        manifest_path,
        paraview_path,
    })
}

fn heat_kind(config: &HeatConfig, summary: &SimSummary) -> RunKind {
    RunKind::Heat {
        dt: config.dt,
        t_final: summary.t_final,
        steps: summary.steps,
        cycle: summary.steps as u64,
    }
}

fn field(space: &Arc<FiniteElementSpace>, x: &DVector<f64>) -> Option<GridFunction> {
    GridFunction::from_values(space.clone(), x.clone()).ok()
}

/// Forwards reported steps to the progress callback and the enabled sinks.
struct HeatObserver<'a, 'b> {
    space: Arc<FiniteElementSpace>,
    glvis: Option<GlvisStream>,
    paraview: Option<ParaViewCollection>,
    progress_cb: &'a mut ProgressCallback<'b>,
    started: Instant,
    t_end: f64,
    // First sink failure, returned once integration is done.
    error: Option<AppError>,
}

impl<'a, 'b> HeatObserver<'a, 'b> {
    fn new(
        config: &HeatConfig,
        space: Arc<FiniteElementSpace>,
        progress_cb: &'a mut ProgressCallback<'b>,
        started: Instant,
    ) -> Self {
        let vis = &config.visualization;
        let glvis = vis.glvis.then(|| GlvisStream::connect(&vis.host, vis.port));
        let paraview = vis.paraview_dir.as_ref().map(|dir| {
            let mut pv = ParaViewCollection::new(HEAT_COLLECTION, dir.clone());
            pv.set_levels_of_detail(levels_of_detail(config.order));
            pv
        });
        Self {
            space,
            glvis,
            paraview,
            progress_cb,
            started,
            t_end: config.t_final,
            error: None,
        }
    }

    fn save_paraview(&mut self, cycle: u64, t: f64, x: &DVector<f64>) {
        let Some(pv) = self.paraview.as_mut() else {
            return;
        };
        pv.set_cycle(cycle);
        pv.set_time(t);
        pv.register_field("u", x.clone());
        if let Err(e) = pv.save(&self.space) {
            warn!(error = %e, "ParaView output failed, further cycles skipped");
            self.paraview = None;
            if self.error.is_none() {
                self.error = Some(e.into());
            }
        }
    }

    fn finish(&mut self) -> AppResult<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl StepObserver for HeatObserver<'_, '_> {
    fn on_start(&mut self, t: f64, x: &DVector<f64>) {
        if let Some(glvis) = self.glvis.as_mut()
            && let Some(gf) = field(&self.space, x)
        {
            glvis.append(self.space.mesh(), &gf, "u");
            glvis.set_bounds(-1.0, 1.0);
        }
        self.save_paraview(0, t, x);
    }

    fn on_step(&mut self, report: &StepReport, x: &DVector<f64>) {
        let fraction_complete = if self.t_end > 0.0 {
            (report.t / self.t_end).min(1.0)
        } else {
            1.0
        };
        emit_progress(
            self.progress_cb,
            RunStage::RunningTransient,
            self.started,
            None,
            Some(TransientProgress {
                sim_time_s: report.t,
                t_end_s: self.t_end,
                fraction_complete,
                step: report.step,
            }),
            None,
        );
        if let Some(glvis) = self.glvis.as_mut()
            && let Some(gf) = field(&self.space, x)
        {
            glvis.update(self.space.mesh(), &gf);
        }
        self.save_paraview(report.step as u64, report.t, x);
    }
}
