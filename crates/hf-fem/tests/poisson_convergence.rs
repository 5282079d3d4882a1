//! Dirichlet Poisson problems solved through the full
//! assemble / reduce / solve / recover pipeline.

use std::f64::consts::PI;
use std::sync::Arc;

use hf_fem::{
    BilinearForm, ConstantCoefficient, DiffusionIntegrator, DomainLoadIntegrator,
    FiniteElementSpace, FunctionCoefficient, GridFunction, LinearForm,
};
use hf_mesh::{BoundaryMarker, CartesianMeshBuilder};
use hf_solver::{IterativeSolver, KrylovMethod, LinearSolver, PreconditionerKind, SolverConfig};

fn exact() -> FunctionCoefficient {
    FunctionCoefficient::time_independent(|x| (PI * x[0]).sin() * (PI * x[1]).sin())
}

fn solve_poisson(n: usize, order: usize, condense: bool) -> (f64, usize) {
    let mesh = Arc::new(CartesianMeshBuilder::new(n, n).build().unwrap());
    let space = Arc::new(FiniteElementSpace::new(mesh.clone(), order).unwrap());
    let ess = space.essential_dofs(&BoundaryMarker::all(&mesh));

    let mut b = LinearForm::new(space.clone());
    b.add_domain_integrator(DomainLoadIntegrator::new(FunctionCoefficient::time_independent(
        |x| 2.0 * PI * PI * (PI * x[0]).sin() * (PI * x[1]).sin(),
    )));
    b.assemble(0.0);

    let mut a = BilinearForm::new(space.clone());
    a.add_domain_integrator(DiffusionIntegrator::new(ConstantCoefficient(1.0)));
    if condense {
        a.enable_static_condensation();
    }
    a.assemble(0.0).unwrap();

    let mut u = GridFunction::new(space.clone());
    u.project_boundary_coefficient(&exact(), &BoundaryMarker::all(&mesh), 0.0);
    let system = a.form_linear_system(&ess, u.values(), b.vector()).unwrap();

    let config = SolverConfig {
        rel_tol: 1e-12,
        abs_tol: 0.0,
        max_iter: 2000,
        ..SolverConfig::default()
    };
    let mut solver = IterativeSolver::new(KrylovMethod::Cg, PreconditionerKind::GaussSeidel, config);
    solver.set_operator(Arc::clone(system.matrix().unwrap())).unwrap();
    let mut x = system.initial_guess();
    solver.solve(system.rhs(), &mut x).unwrap();

    let full = a.recover_solution(&system, &x).unwrap();
    let u = GridFunction::from_values(space, full).unwrap();
    (u.l2_error(&exact(), 0.0), system.size())
}

#[test]
fn linear_elements_converge_at_second_order() {
    let errors: Vec<f64> = [4, 8, 16].iter().map(|&n| solve_poisson(n, 1, false).0).collect();
    for pair in errors.windows(2) {
        let rate = (pair[0] / pair[1]).log2();
        assert!(rate > 1.8, "rate {rate} from {errors:?}");
    }
}

#[test]
fn quadratic_elements_beat_linear_ones() {
    let (e1, _) = solve_poisson(4, 1, false);
    let (e2, _) = solve_poisson(4, 2, false);
    assert!(e2 < e1 / 5.0, "{e2} vs {e1}");
}

#[test]
fn condensed_and_plain_solves_agree() {
    let (plain, n_plain) = solve_poisson(4, 3, false);
    let (condensed, n_condensed) = solve_poisson(4, 3, true);
    assert!(n_condensed < n_plain);
    assert!((plain - condensed).abs() < 1e-8);
}
