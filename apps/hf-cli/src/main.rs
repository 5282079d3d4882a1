use clap::{Args, Parser, Subcommand, ValueEnum};
use hf_app::{
    AppResult, AssemblyMode, EllipticConfig, HeatConfig, LinearSolverKind, RunProgressEvent,
    RunStage, RunTimingSummary, VisualizationConfig, load_config,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "hf-cli")]
#[command(about = "HeatFlow CLI - finite element heat and Poisson solvers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate the manufactured heat problem in time
    Heat(HeatArgs),
    /// Solve the convection-diffusion problem on refined meshes
    Poisson(PoissonArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum SolverArg {
    Cg,
    Pcg,
    Cholesky,
}

impl From<SolverArg> for LinearSolverKind {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Cg => LinearSolverKind::Cg,
            SolverArg::Pcg => LinearSolverKind::Pcg,
            SolverArg::Cholesky => LinearSolverKind::Cholesky,
        }
    }
}

/// Flags shared by both problems. Unset flags keep the config value.
#[derive(Args)]
struct CommonArgs {
    /// YAML or JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Finite element order
    #[arg(short, long)]
    order: Option<usize>,
    /// Stream the solution to a GLVis server
    #[arg(long)]
    vis: bool,
    /// GLVis server host
    #[arg(long)]
    host: Option<String>,
    /// GLVis server port
    #[arg(long)]
    port: Option<u16>,
    /// Write a ParaView collection under this directory
    #[arg(long)]
    paraview: Option<PathBuf>,
    /// Write the run manifest into this directory
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CommonArgs {
    fn apply(&self, order: &mut usize, vis: &mut VisualizationConfig, output: &mut Option<PathBuf>) {
        if let Some(o) = self.order {
            *order = o;
        }
        if self.vis {
            vis.glvis = true;
        }
        if let Some(host) = &self.host {
            vis.host = host.clone();
        }
        if let Some(port) = self.port {
            vis.port = port;
        }
        if let Some(dir) = &self.paraview {
            vis.paraview_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output {
            *output = Some(dir.clone());
        }
    }
}

#[derive(Args)]
struct HeatArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Uniform refinements of the base mesh
    #[arg(short, long)]
    refine: Option<usize>,
    /// Time step size
    #[arg(long)]
    dt: Option<f64>,
    /// Final time
    #[arg(long)]
    t_final: Option<f64>,
    /// ODE solver: 1-4 explicit RK, 11-13 L-stable SDIRK, 21-23 A-stable SDIRK
    #[arg(short = 's', long = "ode-solver")]
    ode_solver: Option<u32>,
    /// Reassemble stiffness and mass at every stage
    #[arg(long)]
    time_dependent: bool,
    /// Linear solver for the implicit stages
    #[arg(long, value_enum)]
    linear_solver: Option<SolverArg>,
    /// Visualize every N steps
    #[arg(long)]
    vis_steps: Option<usize>,
}

#[derive(Args)]
struct PoissonArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Number of refinement levels
    #[arg(short = 'r', long = "levels")]
    levels: Option<usize>,
    /// Diffusion coefficient
    #[arg(long)]
    eps: Option<f64>,
    /// Convection x-direction
    #[arg(long, allow_negative_numbers = true)]
    bx: Option<f64>,
    /// Convection y-direction
    #[arg(long, allow_negative_numbers = true)]
    by: Option<f64>,
    /// Partial (matrix-free) assembly
    #[arg(long, conflicts_with = "fa")]
    pa: bool,
    /// Full assembly
    #[arg(long)]
    fa: bool,
    /// Static condensation
    #[arg(long)]
    sc: bool,
    /// Save the final mesh and solution in MFEM format here
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Heat(args) => cmd_heat(&args),
        Commands::Poisson(args) => cmd_poisson(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn heat_config(args: &HeatArgs) -> AppResult<HeatConfig> {
    let mut config: HeatConfig = match &args.common.config {
        Some(path) => load_config(path)?,
        None => HeatConfig::default(),
    };
    args.common
        .apply(&mut config.order, &mut config.visualization, &mut config.output_dir);
    if let Some(r) = args.refine {
        config.refinements = r;
    }
    if let Some(dt) = args.dt {
        config.dt = dt;
    }
    if let Some(t) = args.t_final {
        config.t_final = t;
    }
    if let Some(id) = args.ode_solver {
        config.integrator = id;
    }
    if args.time_dependent {
        config.time_dependent = true;
    }
    if let Some(kind) = args.linear_solver {
        config.linear_solver = kind.into();
    }
    if let Some(n) = args.vis_steps {
        config.visualization.every = n;
    }
    config.validate()?;
    Ok(config)
}

fn poisson_config(args: &PoissonArgs) -> AppResult<EllipticConfig> {
    let mut config: EllipticConfig = match &args.common.config {
        Some(path) => load_config(path)?,
        None => EllipticConfig::default(),
    };
    args.common
        .apply(&mut config.order, &mut config.visualization, &mut config.output_dir);
    if let Some(levels) = args.levels {
        config.levels = levels;
    }
    if let Some(eps) = args.eps {
        config.eps = eps;
    }
    if let Some(bx) = args.bx {
        config.convection[0] = bx;
    }
    if let Some(by) = args.by {
        config.convection[1] = by;
    }
    if args.pa {
        config.assembly = AssemblyMode::Partial;
    }
    if args.fa {
        config.assembly = AssemblyMode::Full;
    }
    if args.sc {
        config.static_condensation = true;
    }
    if let Some(dir) = &args.save {
        config.save_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn cmd_heat(args: &HeatArgs) -> AppResult<()> {
    let config = heat_config(args)?;
    println!(
        "Heat: order {}, {} refinement(s), dt = {:e}, t_final = {}",
        config.order, config.refinements, config.dt, config.t_final
    );

    // Redraw at most every 100 ms unless the bar moved by half a percent.
    let mut last_draw: Option<(Instant, f64)> = None;
    let report = hf_app::run_heat_with_progress(
        &config,
        Some(&mut |event| {
            let fraction = event.transient.as_ref().map(|t| t.fraction_complete);
            let redraw = match (last_draw, fraction) {
                (None, _) => true,
                (Some((at, prev)), Some(f)) => {
                    f - prev >= 0.005 || f >= 1.0 || at.elapsed().as_millis() >= 100
                }
                (Some((at, _)), None) => at.elapsed().as_millis() >= 100,
            };
            if redraw {
                render_cli_progress(&event);
                let prev = last_draw.map_or(0.0, |(_, p)| p);
                last_draw = Some((Instant::now(), fraction.unwrap_or(prev)));
            }
        }),
    )?;
    clear_progress_line();

    println!("Heat run {} finished", report.run_id);
    println!("  Integrator: {}", report.integrator);
    println!("  Unknowns:   {}", report.dofs);
    println!("  Steps:      {} (t = {})", report.steps, report.t_final);
    println!("  L2 error:   {:.6e}", report.l2_error);
    let stats = &report.operator_stats;
    println!(
        "  Operator:   {} implicit solves, {} matrix build(s), {} linear iterations",
        stats.implicit_calls, stats.combined_builds, stats.linear_iterations
    );
    if let Some(path) = &report.paraview_path {
        println!("  ParaView:   {}", path.display());
    }
    if let Some(path) = &report.manifest_path {
        println!("  Manifest:   {}", path.display());
    }
    print_timing_summary(&report.timing);
    Ok(())
}

fn cmd_poisson(args: &PoissonArgs) -> AppResult<()> {
    let config = poisson_config(args)?;
    println!(
        "Poisson: order {}, eps = {}, b = ({}, {}), {:?} assembly{}",
        config.order,
        config.eps,
        config.convection[0],
        config.convection[1],
        config.assembly,
        if config.static_condensation { ", static condensation" } else { "" }
    );

    let report = hf_app::run_elliptic_with_progress(
        &config,
        Some(&mut |event| {
            if !matches!(event.stage, RunStage::SolvingLevel) {
                render_cli_progress(&event);
            }
        }),
    )?;
    clear_progress_line();

    println!(
        "{:>5} {:>9} {:>9} {:>9} {:>6} {:>14}",
        "level", "elements", "dofs", "system", "iters", "L2 error"
    );
    for level in &report.levels {
        println!(
            "{:>5} {:>9} {:>9} {:>9} {:>6} {:>14.6e}{}",
            level.level,
            level.elements,
            level.dofs,
            level.reduced_size,
            level.iterations,
            level.l2_error,
            if level.converged { "" } else { "  (not converged)" }
        );
    }
    if let Some(path) = &report.paraview_path {
        println!("ParaView: {}", path.display());
    }
    if let Some((mesh, sol)) = &report.saved {
        println!("Saved:    {} {}", mesh.display(), sol.display());
    }
    if let Some(path) = &report.manifest_path {
        println!("Manifest: {}", path.display());
    }
    print_timing_summary(&report.timing);
    Ok(())
}

const BAR_WIDTH: usize = 28;

fn clear_progress_line() {
    print!("\r{:120}\r", "");
    let _ = io::stdout().flush();
}

fn progress_bar(fraction: f64) -> String {
    let filled = ((fraction * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    (0..BAR_WIDTH)
        .map(|i| if i < filled { '=' } else { ' ' })
        .collect()
}

fn render_cli_progress(event: &RunProgressEvent) {
    let line = match (&event.stage, &event.transient) {
        (RunStage::RunningTransient, Some(t)) => format!(
            "[{}] {:5.1}%  step {}  t = {:.4} of {:.4}  ({:.1}s)",
            progress_bar(t.fraction_complete),
            100.0 * t.fraction_complete,
            t.step,
            t.sim_time_s,
            t.t_end_s,
            event.elapsed_wall_s
        ),
        (stage, _) => match &event.message {
            Some(msg) => format!("{}: {msg}  ({:.2}s)", stage.label(), event.elapsed_wall_s),
            None => format!("{}  ({:.2}s)", stage.label(), event.elapsed_wall_s),
        },
    };
    print!("\r{line}");
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &RunTimingSummary) {
    let share = |secs: f64| 100.0 * secs / timing.total_time_s.max(1.0e-12);
    let assembly = timing.assembly_time_s();

    println!();
    println!("Timing:");
    println!("  assembly  {assembly:>9.3}s {:>5.1}%", share(assembly));
    println!(
        "  solves    {:>9.3}s {:>5.1}%  ({} calls)",
        timing.linear_solve_time_s,
        share(timing.linear_solve_time_s),
        timing.linear_solve_count
    );
    println!("  total     {:>9.3}s", timing.total_time_s);
    if tracing::enabled!(tracing::Level::DEBUG) {
        for line in hf_app::phase_breakdown() {
            println!("    {line}");
        }
    }
}
