//! Semi-discrete parabolic operator `M du/dt + K u = f(t)`.
//!
//! Written as `du/dt = M^-1 (f - K u)`. Explicit evaluation solves with `M`;
//! an implicit stage of size `dt` solves with `M + dt K`. The combined matrix
//! and the solver bound to it are kept between calls and only rebuilt when
//! `dt` changes or the operators themselves depend on time.

use std::sync::Arc;

use hf_solver::{IterativeSolver, LinearSolver, SolverConfig, sparse_add, spmv_add};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use tracing::{debug, trace};

use crate::error::{SimError, SimResult};
use crate::operator::{SourceVector, SpatialOperator, TimeDependentOperator};

/// Creates the linear solver on first use.
pub type SolverFactory = Box<dyn Fn() -> Box<dyn LinearSolver>>;

/// CG with relative and absolute tolerance `1e-10`.
pub fn default_solver() -> Box<dyn LinearSolver> {
    Box::new(IterativeSolver::cg(SolverConfig {
        rel_tol: 1e-10,
        abs_tol: 1e-10,
        max_iter: 1_000_000,
        ..SolverConfig::default()
    }))
}

/// Work counters, cumulative over the operator's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorStats {
    pub stiffness_assemblies: usize,
    pub mass_assemblies: usize,
    pub load_assemblies: usize,
    /// Builds of `M + dt K`.
    pub combined_builds: usize,
    pub solver_binds: usize,
    pub solver_constructions: usize,
    pub mult_calls: usize,
    pub implicit_calls: usize,
    pub linear_iterations: usize,
}

/// What the solver currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SolverBinding {
    Unbound,
    Mass { generation: u64 },
    Combined,
}

struct CombinedSystem {
    dt: f64,
    matrix: Arc<CsrMatrix<f64>>,
}

pub struct ParabolicOperator<K, M, L> {
    stiffness: K,
    mass: M,
    load: L,
    time_dependent: bool,
    time: f64,
    factory: SolverFactory,
    solver: Option<Box<dyn LinearSolver>>,
    binding: SolverBinding,
    // None until the first implicit solve.
    cache: Option<CombinedSystem>,
    stats: OperatorStats,
}

impl<K, M, L> ParabolicOperator<K, M, L>
where
    K: SpatialOperator,
    M: SpatialOperator,
    L: SourceVector,
{
    /// Wrap the three pieces and assemble them at `t = 0`.
    pub fn new(stiffness: K, mass: M, load: L) -> SimResult<Self> {
        let n = stiffness.size();
        for (what, actual) in [("mass operator", mass.size()), ("load vector", load.size())] {
            if actual != n {
                return Err(SimError::DimensionMismatch {
                    what,
                    expected: n,
                    actual,
                });
            }
        }
        let mut op = Self {
            stiffness,
            mass,
            load,
            time_dependent: false,
            time: 0.0,
            factory: Box::new(default_solver),
            solver: None,
            binding: SolverBinding::Unbound,
            cache: None,
            stats: OperatorStats::default(),
        };
        op.assemble_pair(0.0)?;
        op.assemble_load(0.0)?;
        Ok(op)
    }

    /// Reassemble `K` and `M` on every time change and every solve.
    pub fn time_dependent(mut self, time_dependent: bool) -> Self {
        self.time_dependent = time_dependent;
        self
    }

    /// Replace the solver factory. Only effective before the first solve.
    pub fn with_solver_factory(mut self, factory: SolverFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn is_time_dependent(&self) -> bool {
        self.time_dependent
    }

    pub fn stats(&self) -> &OperatorStats {
        &self.stats
    }

    /// Step size the combined matrix was built for.
    pub fn cached_dt(&self) -> Option<f64> {
        self.cache.as_ref().map(|c| c.dt)
    }

    pub fn solver_name(&self) -> Option<&'static str> {
        self.solver.as_ref().map(|s| s.name())
    }

    pub fn stiffness(&self) -> &K {
        &self.stiffness
    }

    pub fn mass(&self) -> &M {
        &self.mass
    }

    pub fn load(&self) -> &L {
        &self.load
    }

    fn assemble_pair(&mut self, t: f64) -> SimResult<()> {
        self.stiffness.assemble(t)?;
        self.stats.stiffness_assemblies += 1;
        self.mass.assemble(t)?;
        self.stats.mass_assemblies += 1;
        Ok(())
    }

    fn assemble_load(&mut self, t: f64) -> SimResult<()> {
        self.load.assemble(t)?;
        self.stats.load_assemblies += 1;
        Ok(())
    }

    fn check_len(&self, x: &DVector<f64>) -> SimResult<()> {
        if x.len() != self.size() {
            return Err(SimError::DimensionMismatch {
                what: "state vector",
                expected: self.size(),
                actual: x.len(),
            });
        }
        Ok(())
    }

    fn solver_mut(&mut self) -> &mut dyn LinearSolver {
        let (factory, stats) = (&self.factory, &mut self.stats);
        self.solver
            .get_or_insert_with(|| {
                stats.solver_constructions += 1;
                factory()
            })
            .as_mut()
    }

    /// `load - K x`
    fn residual_rhs(&self, x: &DVector<f64>) -> SimResult<DVector<f64>> {
        let mut rhs = self.load.vector().clone();
        spmv_add(-1.0, self.stiffness.matrix()?, x, &mut rhs);
        Ok(rhs)
    }

    fn bind(&mut self, matrix: Arc<CsrMatrix<f64>>, binding: SolverBinding) -> SimResult<()> {
        self.binding = SolverBinding::Unbound;
        self.solver_mut().set_operator(matrix)?;
        self.binding = binding;
        self.stats.solver_binds += 1;
        Ok(())
    }

    fn solve(&mut self, rhs: &DVector<f64>) -> SimResult<DVector<f64>> {
        let mut y = DVector::zeros(rhs.len());
        let stats = self.solver_mut().solve(rhs, &mut y)?;
        self.stats.linear_iterations += stats.iterations;
        trace!(
            iterations = stats.iterations,
            residual = stats.residual_norm,
            "stage solve"
        );
        Ok(y)
    }
}

impl<K, M, L> TimeDependentOperator for ParabolicOperator<K, M, L>
where
    K: SpatialOperator,
    M: SpatialOperator,
    L: SourceVector,
{
    fn size(&self) -> usize {
        self.stiffness.size()
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn set_time(&mut self, t: f64) -> SimResult<()> {
        if self.time_dependent {
            self.assemble_pair(t)?;
        }
        self.assemble_load(t)?;
        self.time = t;
        Ok(())
    }

    fn mult(&mut self, x: &DVector<f64>) -> SimResult<DVector<f64>> {
        self.check_len(x)?;
        self.solver_mut();
        if self.time_dependent {
            self.assemble_pair(self.time)?;
        }
        self.assemble_load(self.time)?;
        let rhs = self.residual_rhs(x)?;

        let generation = self.mass.generation();
        let wanted = SolverBinding::Mass { generation };
        if self.binding != wanted {
            let m = Arc::clone(self.mass.matrix()?);
            self.bind(m, wanted)?;
            debug!(generation, "solver bound to mass matrix");
        }
        let y = self.solve(&rhs)?;
        self.stats.mult_calls += 1;
        Ok(y)
    }

    fn implicit_solve(&mut self, dt: f64, x: &DVector<f64>) -> SimResult<DVector<f64>> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "implicit step size must be positive and finite",
            });
        }
        self.check_len(x)?;
        self.solver_mut();
        if self.time_dependent {
            self.assemble_pair(self.time)?;
        }

        let stale = self.time_dependent || self.cached_dt() != Some(dt);
        if stale {
            let combined = sparse_add(dt, self.stiffness.matrix()?, 1.0, self.mass.matrix()?);
            self.cache = Some(CombinedSystem {
                dt,
                matrix: Arc::new(combined),
            });
            self.stats.combined_builds += 1;
            debug!(dt, t = self.time, "combined matrix rebuilt");
        }
        if stale || self.binding != SolverBinding::Combined {
            let matrix = match &self.cache {
                Some(cache) => Arc::clone(&cache.matrix),
                None => {
                    return Err(SimError::InvalidState {
                        what: "combined matrix missing after build".to_string(),
                    });
                }
            };
            self.bind(matrix, SolverBinding::Combined)?;
        }

        let rhs = self.residual_rhs(x)?;
        let y = self.solve(&rhs)?;
        self.stats.implicit_calls += 1;
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_solver::CholeskySolver;
    use nalgebra_sparse::CooMatrix;

    /// `scale(t) * base`, counting assemblies.
    struct ScaledMatrix {
        base: CsrMatrix<f64>,
        scale: fn(f64) -> f64,
        matrix: Arc<CsrMatrix<f64>>,
        assemblies: usize,
        generation: u64,
    }

    impl ScaledMatrix {
        fn new(base: CsrMatrix<f64>, scale: fn(f64) -> f64) -> Self {
            let matrix = Arc::new(base.clone());
            Self {
                base,
                scale,
                matrix,
                assemblies: 0,
                generation: 0,
            }
        }
    }

    impl SpatialOperator for ScaledMatrix {
        fn size(&self) -> usize {
            self.base.nrows()
        }

        fn assemble(&mut self, t: f64) -> SimResult<()> {
            self.matrix = Arc::new(&self.base * (self.scale)(t));
            self.assemblies += 1;
            self.generation += 1;
            Ok(())
        }

        fn matrix(&self) -> SimResult<&Arc<CsrMatrix<f64>>> {
            Ok(&self.matrix)
        }

        fn generation(&self) -> u64 {
            self.generation
        }
    }

    struct ConstantLoad(DVector<f64>);

    impl SourceVector for ConstantLoad {
        fn size(&self) -> usize {
            self.0.len()
        }

        fn assemble(&mut self, _t: f64) -> SimResult<()> {
            Ok(())
        }

        fn vector(&self) -> &DVector<f64> {
            &self.0
        }
    }

    fn laplacian(n: usize) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 2.0);
            if i > 0 {
                coo.push(i, i - 1, -1.0);
            }
            if i + 1 < n {
                coo.push(i, i + 1, -1.0);
            }
        }
        CsrMatrix::from(&coo)
    }

    fn identity(n: usize) -> CsrMatrix<f64> {
        CsrMatrix::identity(n)
    }

    fn operator(n: usize) -> ParabolicOperator<ScaledMatrix, ScaledMatrix, ConstantLoad> {
        ParabolicOperator::new(
            ScaledMatrix::new(laplacian(n), |_| 1.0),
            ScaledMatrix::new(identity(n), |_| 1.0),
            ConstantLoad(DVector::from_element(n, 1.0)),
        )
        .unwrap()
    }

    fn state(n: usize) -> DVector<f64> {
        DVector::from_fn(n, |i, _| (i as f64 * 0.3).cos())
    }

    #[test]
    fn repeated_solves_with_one_dt_build_and_bind_once() {
        let mut op = operator(6);
        let x = state(6);
        for _ in 0..5 {
            op.implicit_solve(0.1, &x).unwrap();
        }
        let stats = op.stats();
        assert_eq!(stats.combined_builds, 1);
        assert_eq!(stats.solver_binds, 1);
        assert_eq!(stats.solver_constructions, 1);
        assert_eq!(stats.implicit_calls, 5);
        assert_eq!(op.cached_dt(), Some(0.1));
    }

    #[test]
    fn changing_dt_rebuilds_once_on_that_call() {
        let mut op = operator(6);
        let x = state(6);
        for _ in 0..3 {
            op.implicit_solve(0.1, &x).unwrap();
        }
        op.implicit_solve(0.05, &x).unwrap();
        assert_eq!(op.stats().combined_builds, 2);
        op.implicit_solve(0.05, &x).unwrap();
        assert_eq!(op.stats().combined_builds, 2);
        assert_eq!(op.stats().solver_binds, 2);
        assert_eq!(op.stats().solver_constructions, 1);
    }

    #[test]
    fn implicit_solve_satisfies_stage_equation() {
        let n = 8;
        let mut op = operator(n);
        let x = state(n);
        let dt = 0.3;
        let k = op.implicit_solve(dt, &x).unwrap();
        // (M + dt K) k = f - K x
        let a = laplacian(n);
        let lhs = &k + &a * &k * dt;
        let rhs = DVector::from_element(n, 1.0) - &a * &x;
        assert!((lhs - rhs).norm() < 1e-8);
    }

    #[test]
    fn mult_solves_with_mass() {
        let n = 5;
        let mut op = ParabolicOperator::new(
            ScaledMatrix::new(laplacian(n), |_| 1.0),
            ScaledMatrix::new(identity(n), |_| 2.0),
            ConstantLoad(DVector::zeros(n)),
        )
        .unwrap();
        let x = state(n);
        let y = op.mult(&x).unwrap();
        assert_eq!(y.len(), n);
        let expected = -(&laplacian(n) * &x) / 2.0;
        assert!((y - expected).norm() < 1e-8);
    }

    #[test]
    fn mult_after_implicit_rebinds_without_rebuilding() {
        let mut op = operator(6);
        let x = state(6);
        op.implicit_solve(0.1, &x).unwrap();
        op.mult(&x).unwrap();
        op.implicit_solve(0.1, &x).unwrap();
        let stats = op.stats();
        assert_eq!(stats.combined_builds, 1);
        assert_eq!(stats.solver_binds, 3);

        // Consecutive mults keep the mass binding.
        op.mult(&x).unwrap();
        op.mult(&x).unwrap();
        assert_eq!(op.stats().solver_binds, 4);
    }

    #[test]
    fn time_dependent_operator_rebuilds_every_call() {
        let mut op = operator(4).time_dependent(true);
        let x = state(4);
        let builds_before = op.stats().stiffness_assemblies;
        for _ in 0..3 {
            op.implicit_solve(0.1, &x).unwrap();
        }
        assert_eq!(op.stats().combined_builds, 3);
        assert_eq!(op.stats().solver_binds, 3);
        assert_eq!(op.stats().stiffness_assemblies, builds_before + 3);
    }

    #[test]
    fn set_time_on_time_invariant_pair_leaves_matrices_alone() {
        let mut op = operator(4);
        let k_before = Arc::clone(op.stiffness().matrix().unwrap());
        op.set_time(0.5).unwrap();
        op.set_time(0.5).unwrap();
        assert_eq!(op.stats().stiffness_assemblies, 1);
        assert_eq!(op.stats().mass_assemblies, 1);
        assert_eq!(op.stats().load_assemblies, 3);
        assert!(Arc::ptr_eq(&k_before, op.stiffness().matrix().unwrap()));
        assert_eq!(op.time(), 0.5);
    }

    #[test]
    fn set_time_reassembles_time_dependent_pair() {
        let mut op = ParabolicOperator::new(
            ScaledMatrix::new(laplacian(3), |t| 1.0 + t),
            ScaledMatrix::new(identity(3), |_| 1.0),
            ConstantLoad(DVector::zeros(3)),
        )
        .unwrap()
        .time_dependent(true);
        op.set_time(1.0).unwrap();
        assert_eq!(op.stiffness().assemblies, 2);
        let k = op.stiffness().matrix().unwrap();
        assert_eq!(k.get_entry(0, 0).unwrap().into_value(), 4.0);
    }

    #[test]
    fn rejects_bad_step_and_length() {
        let mut op = operator(4);
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                op.implicit_solve(dt, &state(4)),
                Err(SimError::InvalidArg { .. })
            ));
        }
        assert!(matches!(
            op.mult(&state(3)),
            Err(SimError::DimensionMismatch { expected: 4, actual: 3, .. })
        ));
        assert!(matches!(
            op.implicit_solve(0.1, &state(5)),
            Err(SimError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn mismatched_pieces_are_rejected() {
        let result = ParabolicOperator::new(
            ScaledMatrix::new(laplacian(4), |_| 1.0),
            ScaledMatrix::new(identity(3), |_| 1.0),
            ConstantLoad(DVector::zeros(4)),
        );
        assert!(matches!(result, Err(SimError::DimensionMismatch { .. })));
    }

    #[test]
    fn custom_solver_factory_is_used() {
        let mut op = operator(5).with_solver_factory(Box::new(|| Box::new(CholeskySolver::new())));
        assert_eq!(op.solver_name(), None);
        op.implicit_solve(0.2, &state(5)).unwrap();
        assert_eq!(op.solver_name(), Some("Cholesky"));
    }
}
