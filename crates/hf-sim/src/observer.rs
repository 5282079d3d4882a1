//! Step observers: injected sinks for progress, logging and visualization.

use nalgebra::DVector;
use tracing::info;

use crate::sim::SimSummary;

/// Snapshot handed to observers after a step.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepReport {
    /// 1-based step count.
    pub step: usize,
    pub t: f64,
    pub dt: f64,
    pub last: bool,
}

pub trait StepObserver {
    fn on_start(&mut self, _t: f64, _x: &DVector<f64>) {}

    fn on_step(&mut self, report: &StepReport, x: &DVector<f64>);

    fn on_finish(&mut self, _summary: &SimSummary, _x: &DVector<f64>) {}
}

/// Ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn on_step(&mut self, _report: &StepReport, _x: &DVector<f64>) {}
}

/// Logs reported steps at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl StepObserver for TracingObserver {
    fn on_step(&mut self, report: &StepReport, x: &DVector<f64>) {
        info!(
            step = report.step,
            t = report.t,
            dt = report.dt,
            norm = x.norm(),
            "time step"
        );
    }

    fn on_finish(&mut self, summary: &SimSummary, _x: &DVector<f64>) {
        info!(steps = summary.steps, t_final = summary.t_final, "time integration finished");
    }
}

/// Adapts a closure to `StepObserver`.
pub struct FnObserver<F>(pub F);

impl<F> StepObserver for FnObserver<F>
where
    F: FnMut(&StepReport, &DVector<f64>),
{
    fn on_step(&mut self, report: &StepReport, x: &DVector<f64>) {
        (self.0)(report, x)
    }
}
