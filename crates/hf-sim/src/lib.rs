//! Time integration of semi-discrete parabolic problems.
//!
//! Provides:
//! - `ParabolicOperator`: `M du/dt + K u = f(t)` as a time-dependent
//!   operator with explicit evaluation and cached implicit stage solves
//! - Butcher-tableau integrators selected by numeric id
//! - `run_sim`: fixed-step driver that lands exactly on the final time
//! - Step observers for progress and visualization hooks

pub mod error;
pub mod integrator;
pub mod observer;
pub mod operator;
pub mod parabolic;
pub mod sim;

pub use error::{SimError, SimResult};
pub use integrator::{ButcherTableau, Integrator, IntegratorType};
pub use observer::{FnObserver, NullObserver, StepObserver, StepReport, TracingObserver};
pub use operator::{SourceVector, SpatialOperator, TimeDependentOperator};
pub use parabolic::{OperatorStats, ParabolicOperator, SolverFactory, default_solver};
pub use sim::{SimOptions, SimSummary, run_sim};
