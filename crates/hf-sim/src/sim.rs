//! Fixed-step time integration driver.

use nalgebra::DVector;
use tracing::{debug, info};

use crate::error::{SimError, SimResult};
use crate::integrator::{Integrator, IntegratorType};
use crate::observer::{StepObserver, StepReport};
use crate::operator::TimeDependentOperator;

/// A remaining interval within this fraction of `dt` is merged into the
/// final step.
const REMAINDER_FOLD: f64 = 1e-12;
/// Rounding slack on the clock, in ulps of the larger end time.
const CLOCK_ULPS: f64 = 8.0;

/// Options for simulation runs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimOptions {
    /// Nominal step size
    pub dt: f64,
    pub t_start: f64,
    pub t_final: f64,
    pub integrator: IntegratorType,
    /// Safety limit on the number of steps
    pub max_steps: usize,
    /// Notify the observer every N-th step (the last step always)
    pub report_every: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            t_start: 0.0,
            t_final: 1.0,
            integrator: IntegratorType::default(),
            max_steps: 10_000_000,
            report_every: 10,
        }
    }
}

impl SimOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "dt must be positive and finite",
            });
        }
        if !(self.t_final >= self.t_start) || !self.t_final.is_finite() {
            return Err(SimError::InvalidArg {
                what: "t_final must be finite and not before t_start",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        if self.report_every == 0 {
            return Err(SimError::InvalidArg {
                what: "report_every must be positive",
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimSummary {
    pub steps: usize,
    pub t_final: f64,
    /// Size of the last step taken, 0 if none.
    pub last_dt: f64,
}

/// Integrate `x` from `t_start` to exactly `t_final`.
///
/// Steps are `dt` long except the last, which is shortened (or stretched by
/// at most a rounding remainder) so that the run ends on `t_final`.
pub fn run_sim<O>(
    op: &mut O,
    x: &mut DVector<f64>,
    opts: &SimOptions,
    observer: &mut dyn StepObserver,
) -> SimResult<SimSummary>
where
    O: TimeDependentOperator + ?Sized,
{
    opts.validate()?;
    if x.len() != op.size() {
        return Err(SimError::DimensionMismatch {
            what: "initial state",
            expected: op.size(),
            actual: x.len(),
        });
    }

    let tableau = opts.integrator.tableau();
    let mut t = opts.t_start;
    op.set_time(t)?;
    observer.on_start(t, x);
    info!(
        integrator = %opts.integrator,
        dt = opts.dt,
        t_start = opts.t_start,
        t_final = opts.t_final,
        "starting time integration"
    );

    let slack = REMAINDER_FOLD * opts.dt
        + CLOCK_ULPS * f64::EPSILON * opts.t_start.abs().max(opts.t_final.abs());
    let mut steps = 0;
    let mut last_dt = 0.0;
    while t < opts.t_final {
        if steps >= opts.max_steps {
            return Err(SimError::InvalidState {
                what: format!("max_steps ({}) reached at t = {t}", opts.max_steps),
            });
        }
        let remaining = opts.t_final - t;
        let last = remaining <= opts.dt + slack;
        // A remainder that is `dt` up to rounding keeps the nominal step, so
        // implicit schemes see one step size for the whole run.
        let dt = if remaining >= opts.dt - slack { opts.dt } else { remaining };

        tableau.step(op, x, t, dt)?;
        steps += 1;
        last_dt = dt;
        // Derived from the step count so rounding does not accumulate.
        t = if last {
            opts.t_final
        } else {
            opts.t_start + steps as f64 * opts.dt
        };

        debug!(step = steps, t, dt, "step done");
        if last || steps % opts.report_every == 0 {
            let report = StepReport {
                step: steps,
                t,
                dt,
                last,
            };
            observer.on_step(&report, x);
        }
    }

    let summary = SimSummary {
        steps,
        t_final: t,
        last_dt,
    };
    observer.on_finish(&summary, x);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{FnObserver, NullObserver};
    use proptest::prelude::*;

    /// `du/dt = 1`, recording the time of every evaluation.
    struct Clock {
        t: f64,
        times: Vec<f64>,
    }

    impl TimeDependentOperator for Clock {
        fn size(&self) -> usize {
            1
        }

        fn time(&self) -> f64 {
            self.t
        }

        fn set_time(&mut self, t: f64) -> SimResult<()> {
            self.t = t;
            Ok(())
        }

        fn mult(&mut self, _x: &DVector<f64>) -> SimResult<DVector<f64>> {
            self.times.push(self.t);
            Ok(DVector::from_element(1, 1.0))
        }

        fn implicit_solve(&mut self, _dt: f64, x: &DVector<f64>) -> SimResult<DVector<f64>> {
            self.mult(x)
        }
    }

    fn clock() -> Clock {
        Clock {
            t: 0.0,
            times: Vec::new(),
        }
    }

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.dt, 1e-3);
        assert_eq!(opts.t_final, 1.0);
        assert_eq!(opts.integrator, IntegratorType::ImplicitMidpoint);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn sim_options_invalid() {
        let bad = [
            SimOptions { dt: 0.0, ..SimOptions::default() },
            SimOptions { dt: f64::NAN, ..SimOptions::default() },
            SimOptions { t_final: -1.0, ..SimOptions::default() },
            SimOptions { max_steps: 0, ..SimOptions::default() },
            SimOptions { report_every: 0, ..SimOptions::default() },
        ];
        for opts in bad {
            let mut x = DVector::zeros(1);
            assert!(matches!(
                run_sim(&mut clock(), &mut x, &opts, &mut NullObserver),
                Err(SimError::InvalidArg { .. })
            ));
        }
    }

    #[test]
    fn last_step_is_shortened_to_hit_final_time() {
        let opts = SimOptions {
            dt: 0.3,
            t_final: 1.0,
            integrator: IntegratorType::ForwardEuler,
            report_every: 1,
            ..SimOptions::default()
        };
        let mut x = DVector::zeros(1);
        let mut reports = Vec::new();
        let mut observer = FnObserver(|r: &StepReport, _: &DVector<f64>| reports.push(*r));
        let summary = run_sim(&mut clock(), &mut x, &opts, &mut observer).unwrap();
        assert_eq!(summary.steps, 4);
        assert_eq!(summary.t_final, 1.0);
        assert!((summary.last_dt - 0.1).abs() < 1e-12);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert_eq!(reports.len(), 4);
        assert!(reports[3].last);
    }

    #[test]
    fn rounding_remainder_is_folded_into_last_step() {
        let opts = SimOptions {
            dt: 0.1,
            t_final: 1.0,
            integrator: IntegratorType::ForwardEuler,
            ..SimOptions::default()
        };
        let mut x = DVector::zeros(1);
        let summary = run_sim(&mut clock(), &mut x, &opts, &mut NullObserver).unwrap();
        assert_eq!(summary.steps, 10);
        assert_eq!(summary.t_final, 1.0);
    }

    #[test]
    fn stages_see_their_own_times() {
        let opts = SimOptions {
            dt: 0.5,
            t_start: 1.0,
            t_final: 2.0,
            integrator: IntegratorType::Rk4,
            ..SimOptions::default()
        };
        let mut op = clock();
        let mut x = DVector::zeros(1);
        run_sim(&mut op, &mut x, &opts, &mut NullObserver).unwrap();
        assert_eq!(op.times, vec![1.0, 1.25, 1.25, 1.5, 1.5, 1.75, 1.75, 2.0]);
    }

    /// `du/dt = 0`, keeping every distinct implicit step size it is given.
    #[derive(Default)]
    struct StepSizes {
        t: f64,
        seen: Vec<f64>,
    }

    impl TimeDependentOperator for StepSizes {
        fn size(&self) -> usize {
            1
        }

        fn time(&self) -> f64 {
            self.t
        }

        fn set_time(&mut self, t: f64) -> SimResult<()> {
            self.t = t;
            Ok(())
        }

        fn mult(&mut self, _x: &DVector<f64>) -> SimResult<DVector<f64>> {
            Ok(DVector::zeros(1))
        }

        fn implicit_solve(&mut self, dt: f64, _x: &DVector<f64>) -> SimResult<DVector<f64>> {
            if !self.seen.contains(&dt) {
                self.seen.push(dt);
            }
            Ok(DVector::zeros(1))
        }
    }

    #[test]
    fn long_fixed_step_run_keeps_one_step_size() {
        let opts = SimOptions {
            dt: 1e-5,
            t_final: 1.0,
            integrator: IntegratorType::BackwardEuler,
            ..SimOptions::default()
        };
        let mut op = StepSizes::default();
        let mut x = DVector::zeros(1);
        let summary = run_sim(&mut op, &mut x, &opts, &mut NullObserver).unwrap();
        assert_eq!(summary.steps, 100_000);
        assert_eq!(summary.t_final, 1.0);
        assert_eq!(summary.last_dt, 1e-5);
        assert_eq!(op.seen, vec![1e-5]);
    }

    #[test]
    fn offset_start_does_not_add_a_sliver_step() {
        let opts = SimOptions {
            dt: 0.01,
            t_start: 0.7,
            t_final: 3.1,
            integrator: IntegratorType::BackwardEuler,
            ..SimOptions::default()
        };
        let mut op = StepSizes::default();
        let mut x = DVector::zeros(1);
        let summary = run_sim(&mut op, &mut x, &opts, &mut NullObserver).unwrap();
        assert_eq!(summary.steps, 240);
        assert_eq!(summary.t_final, 3.1);
        assert_eq!(op.seen, vec![0.01]);
    }

    #[test]
    fn max_steps_is_enforced() {
        let opts = SimOptions {
            dt: 0.1,
            max_steps: 3,
            ..SimOptions::default()
        };
        let mut x = DVector::zeros(1);
        assert!(matches!(
            run_sim(&mut clock(), &mut x, &opts, &mut NullObserver),
            Err(SimError::InvalidState { .. })
        ));
    }

    #[test]
    fn empty_interval_takes_no_steps() {
        let opts = SimOptions {
            t_start: 0.5,
            t_final: 0.5,
            ..SimOptions::default()
        };
        let mut x = DVector::from_element(1, 3.0);
        let summary = run_sim(&mut clock(), &mut x, &opts, &mut NullObserver).unwrap();
        assert_eq!(summary.steps, 0);
        assert_eq!(x[0], 3.0);
    }

    proptest! {
        #[test]
        fn final_time_is_hit_exactly(dt in 0.01f64..0.5, t_final in 0.05f64..3.0) {
            let opts = SimOptions {
                dt,
                t_final,
                integrator: IntegratorType::ForwardEuler,
                ..SimOptions::default()
            };
            let mut x = DVector::zeros(1);
            let summary = run_sim(&mut clock(), &mut x, &opts, &mut NullObserver).unwrap();
            prop_assert_eq!(summary.t_final, t_final);
            prop_assert!(summary.last_dt > 0.0 && summary.last_dt <= dt * (1.0 + 1e-9));
            prop_assert!((x[0] - t_final).abs() < 1e-9);
        }
    }
}
