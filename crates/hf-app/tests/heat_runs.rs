//! Heat runs through the service layer: accuracy, progress and outputs.

use hf_app::{
    AppError, HeatConfig, LinearSolverKind, RunProgressEvent, RunStage, run_heat,
    run_heat_with_progress,
};
use hf_sim::IntegratorType;

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("hf_app_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn coarse(dt: f64) -> HeatConfig {
    HeatConfig {
        dt,
        ..HeatConfig::default()
    }
}

#[test]
fn reference_run_reaches_final_time_with_one_factorization() {
    let report = run_heat(&coarse(1e-2)).unwrap();
    assert_eq!(report.integrator, IntegratorType::ImplicitMidpoint);
    assert_eq!(report.dofs, 25);
    assert_eq!(report.steps, 100);
    assert_eq!(report.t_final, 1.0);
    assert!(report.l2_error < 5e-2, "L2 error {}", report.l2_error);

    let stats = report.operator_stats;
    assert_eq!(stats.combined_builds, 1);
    assert_eq!(stats.solver_binds, 1);
    assert_eq!(stats.solver_constructions, 1);
    assert!(report.timing.total_time_s > 0.0);
}

#[test]
fn linear_solver_choice_does_not_change_the_answer() {
    let cg = run_heat(&coarse(2e-2)).unwrap();
    for kind in [LinearSolverKind::Pcg, LinearSolverKind::Cholesky] {
        let config = HeatConfig {
            linear_solver: kind,
            ..coarse(2e-2)
        };
        let other = run_heat(&config).unwrap();
        assert!((cg.l2_error - other.l2_error).abs() < 1e-6, "{kind:?}");
    }
}

#[test]
fn time_dependent_flag_rebuilds_every_solve() {
    let config = HeatConfig {
        t_final: 0.1,
        integrator: IntegratorType::BackwardEuler.id(),
        time_dependent: true,
        ..coarse(1e-2)
    };
    let report = run_heat(&config).unwrap();
    assert_eq!(report.steps, 10);
    assert_eq!(report.operator_stats.combined_builds, 10);
}

#[test]
fn progress_reports_transient_fraction() {
    let config = HeatConfig {
        t_final: 0.2,
        ..coarse(1e-2)
    };
    let mut events: Vec<RunProgressEvent> = Vec::new();
    run_heat_with_progress(&config, Some(&mut |event| events.push(event))).unwrap();

    assert!(matches!(events.first().map(|e| &e.stage), Some(RunStage::BuildingMesh)));
    assert!(matches!(events.last().map(|e| &e.stage), Some(RunStage::Completed)));
    let fractions: Vec<f64> = events
        .iter()
        .filter_map(|e| e.transient.as_ref().map(|t| t.fraction_complete))
        .collect();
    // One event every 5 steps out of 20.
    assert_eq!(fractions.len(), 4);
    assert!(fractions.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(fractions.last().copied(), Some(1.0));
    assert!(events.windows(2).all(|w| w[1].elapsed_wall_s >= w[0].elapsed_wall_s));
}

#[test]
fn paraview_and_manifest_are_written() {
    let dir = temp_dir("heat_outputs");
    let mut config = HeatConfig {
        t_final: 0.05,
        output_dir: Some(dir.join("run")),
        ..coarse(1e-2)
    };
    config.visualization.paraview_dir = Some(dir.join("ParaView"));
    let report = run_heat(&config).unwrap();

    assert!(dir.join("ParaView/Heat/Cycle000000/data.vtu").exists());
    assert!(dir.join("ParaView/Heat/Cycle000005/data.vtu").exists());
    let pvd = std::fs::read_to_string(report.paraview_path.unwrap()).unwrap();
    assert_eq!(pvd.matches("<DataSet").count(), 2);

    let manifest = hf_output::load_manifest(&dir.join("run")).unwrap();
    assert_eq!(manifest.run_id, report.run_id);
    assert_eq!(manifest.l2_error, Some(report.l2_error));
    assert!(matches!(manifest.kind, hf_output::RunKind::Heat { steps: 5, .. }));
}

#[test]
fn unreachable_glvis_server_does_not_stop_the_run() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = HeatConfig {
        t_final: 0.05,
        ..coarse(1e-2)
    };
    config.visualization.glvis = true;
    config.visualization.host = "127.0.0.1".to_string();
    config.visualization.port = port;
    let report = run_heat(&config).unwrap();
    assert_eq!(report.steps, 5);
}

#[test]
fn invalid_config_is_reported_before_running() {
    let config = HeatConfig {
        integrator: 99,
        ..HeatConfig::default()
    };
    let err = run_heat(&config).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("99"));
}
