//! Runge-Kutta time integrators defined by Butcher tableaux.

use nalgebra::DVector;

use crate::error::{SimError, SimResult};
use crate::operator::TimeDependentOperator;

/// Advances a state by one step.
pub trait Integrator {
    /// Advance `x` from `t` to `t + dt` in place and return the new time.
    fn step<O: TimeDependentOperator + ?Sized>(
        &self,
        op: &mut O,
        x: &mut DVector<f64>,
        t: f64,
        dt: f64,
    ) -> SimResult<f64>;
}

/// Integrator selection. Ids follow the usual numbering: 1-4 explicit,
/// 11-13 L-stable SDIRK, 21-23 A-stable SDIRK.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntegratorType {
    ForwardEuler,
    Rk2,
    Rk3Ssp,
    Rk4,
    BackwardEuler,
    Sdirk2,
    Sdirk33,
    #[default]
    ImplicitMidpoint,
    Sdirk23,
    Sdirk34,
}

impl IntegratorType {
    pub const ALL: [IntegratorType; 10] = [
        IntegratorType::ForwardEuler,
        IntegratorType::Rk2,
        IntegratorType::Rk3Ssp,
        IntegratorType::Rk4,
        IntegratorType::BackwardEuler,
        IntegratorType::Sdirk2,
        IntegratorType::Sdirk33,
        IntegratorType::ImplicitMidpoint,
        IntegratorType::Sdirk23,
        IntegratorType::Sdirk34,
    ];

    pub fn from_id(id: u32) -> SimResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or(SimError::UnknownIntegrator { id })
    }

    pub fn id(self) -> u32 {
        match self {
            IntegratorType::ForwardEuler => 1,
            IntegratorType::Rk2 => 2,
            IntegratorType::Rk3Ssp => 3,
            IntegratorType::Rk4 => 4,
            IntegratorType::BackwardEuler => 11,
            IntegratorType::Sdirk2 => 12,
            IntegratorType::Sdirk33 => 13,
            IntegratorType::ImplicitMidpoint => 21,
            IntegratorType::Sdirk23 => 22,
            IntegratorType::Sdirk34 => 23,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntegratorType::ForwardEuler => "forward Euler",
            IntegratorType::Rk2 => "RK2 midpoint",
            IntegratorType::Rk3Ssp => "RK3 SSP",
            IntegratorType::Rk4 => "RK4",
            IntegratorType::BackwardEuler => "backward Euler",
            IntegratorType::Sdirk2 => "SDIRK2",
            IntegratorType::Sdirk33 => "SDIRK33",
            IntegratorType::ImplicitMidpoint => "implicit midpoint",
            IntegratorType::Sdirk23 => "SDIRK23",
            IntegratorType::Sdirk34 => "SDIRK34",
        }
    }

    /// Classical order of accuracy.
    pub fn order(self) -> usize {
        match self {
            IntegratorType::ForwardEuler | IntegratorType::BackwardEuler => 1,
            IntegratorType::Rk2 | IntegratorType::Sdirk2 | IntegratorType::ImplicitMidpoint => 2,
            IntegratorType::Rk3Ssp | IntegratorType::Sdirk33 | IntegratorType::Sdirk23 => 3,
            IntegratorType::Rk4 | IntegratorType::Sdirk34 => 4,
        }
    }

    pub fn is_implicit(self) -> bool {
        self.id() > 10
    }

    pub fn tableau(self) -> ButcherTableau {
        match self {
            IntegratorType::ForwardEuler => ButcherTableau::new(vec![vec![0.0]], vec![1.0], vec![0.0]),
            IntegratorType::Rk2 => ButcherTableau::new(
                vec![vec![0.0, 0.0], vec![0.5, 0.0]],
                vec![0.0, 1.0],
                vec![0.0, 0.5],
            ),
            IntegratorType::Rk3Ssp => ButcherTableau::new(
                vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.25, 0.25, 0.0]],
                vec![1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
                vec![0.0, 1.0, 0.5],
            ),
            IntegratorType::Rk4 => ButcherTableau::new(
                vec![
                    vec![0.0, 0.0, 0.0, 0.0],
                    vec![0.5, 0.0, 0.0, 0.0],
                    vec![0.0, 0.5, 0.0, 0.0],
                    vec![0.0, 0.0, 1.0, 0.0],
                ],
                vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
                vec![0.0, 0.5, 0.5, 1.0],
            ),
            IntegratorType::BackwardEuler => ButcherTableau::new(vec![vec![1.0]], vec![1.0], vec![1.0]),
            IntegratorType::Sdirk2 => {
                let g = 1.0 - 1.0 / 2f64.sqrt();
                ButcherTableau::new(
                    vec![vec![g, 0.0], vec![1.0 - g, g]],
                    vec![1.0 - g, g],
                    vec![g, 1.0],
                )
            }
            IntegratorType::Sdirk33 => {
                let a = 0.435866521508459;
                let c2 = (1.0 + a) / 2.0;
                let b1 = -(6.0 * a * a - 16.0 * a + 1.0) / 4.0;
                let b2 = (6.0 * a * a - 20.0 * a + 5.0) / 4.0;
                ButcherTableau::new(
                    vec![vec![a, 0.0, 0.0], vec![c2 - a, a, 0.0], vec![b1, b2, a]],
                    vec![b1, b2, a],
                    vec![a, c2, 1.0],
                )
            }
            IntegratorType::ImplicitMidpoint => ButcherTableau::new(vec![vec![0.5]], vec![1.0], vec![0.5]),
            IntegratorType::Sdirk23 => {
                let g = (3.0 + 3f64.sqrt()) / 6.0;
                ButcherTableau::new(
                    vec![vec![g, 0.0], vec![1.0 - 2.0 * g, g]],
                    vec![0.5, 0.5],
                    vec![g, 1.0 - g],
                )
            }
            IntegratorType::Sdirk34 => {
                let g = (1.0 + 2.0 * (std::f64::consts::PI / 18.0).cos() / 3f64.sqrt()) / 2.0;
                let d = 1.0 / (6.0 * (2.0 * g - 1.0) * (2.0 * g - 1.0));
                ButcherTableau::new(
                    vec![
                        vec![g, 0.0, 0.0],
                        vec![0.5 - g, g, 0.0],
                        vec![2.0 * g, 1.0 - 4.0 * g, g],
                    ],
                    vec![d, 1.0 - 2.0 * d, d],
                    vec![g, 0.5, 1.0 - g],
                )
            }
        }
    }
}

impl std::fmt::Display for IntegratorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

/// Lower-triangular Butcher tableau. Stages with a zero diagonal entry are
/// explicit evaluations, the rest are implicit stage solves.
#[derive(Clone, Debug, PartialEq)]
pub struct ButcherTableau {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl ButcherTableau {
    pub fn new(a: Vec<Vec<f64>>, b: Vec<f64>, c: Vec<f64>) -> Self {
        debug_assert!(a.len() == b.len() && b.len() == c.len());
        Self { a, b, c }
    }

    pub fn stages(&self) -> usize {
        self.b.len()
    }

    pub fn is_explicit(&self) -> bool {
        (0..self.stages()).all(|i| self.a[i][i] == 0.0)
    }
}

impl Integrator for ButcherTableau {
    fn step<O: TimeDependentOperator + ?Sized>(
        &self,
        op: &mut O,
        x: &mut DVector<f64>,
        t: f64,
        dt: f64,
    ) -> SimResult<f64> {
        let mut k: Vec<DVector<f64>> = Vec::with_capacity(self.stages());
        for i in 0..self.stages() {
            let mut stage = x.clone();
            for (j, kj) in k.iter().enumerate() {
                let aij = self.a[i][j];
                if aij != 0.0 {
                    stage.axpy(dt * aij, kj, 1.0);
                }
            }
            op.set_time(t + self.c[i] * dt)?;
            let aii = self.a[i][i];
            let ki = if aii == 0.0 {
                op.mult(&stage)?
            } else {
                op.implicit_solve(aii * dt, &stage)?
            };
            k.push(ki);
        }
        for (bi, ki) in self.b.iter().zip(&k) {
            x.axpy(dt * bi, ki, 1.0);
        }
        Ok(t + dt)
    }
}

impl Integrator for IntegratorType {
    fn step<O: TimeDependentOperator + ?Sized>(
        &self,
        op: &mut O,
        x: &mut DVector<f64>,
        t: f64,
        dt: f64,
    ) -> SimResult<f64> {
        self.tableau().step(op, x, t, dt)
    }
}
