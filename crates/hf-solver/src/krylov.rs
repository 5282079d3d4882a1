//! Krylov subspace methods: preconditioned CG and restarted GMRES.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::error::{SolverError, SolverResult};
use crate::operator::LinearOperator;
use crate::preconditioner::Preconditioner;

/// Iterative solver configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Relative tolerance on the (preconditioned) residual norm
    pub rel_tol: f64,
    /// Absolute tolerance on the (preconditioned) residual norm
    pub abs_tol: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Krylov dimension before GMRES restarts
    pub restart: usize,
    /// Use the incoming `x` as initial guess instead of zero
    pub iterative_mode: bool,
    /// Turn non-convergence into an error instead of a warning
    pub strict: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rel_tol: 1e-10,
            abs_tol: 1e-10,
            max_iter: 1000,
            restart: 50,
            iterative_mode: false,
            strict: true,
        }
    }
}

/// Outcome of one linear solve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveStats {
    pub iterations: usize,
    /// Final residual norm (in the preconditioner's norm)
    pub residual_norm: f64,
    pub initial_residual_norm: f64,
    pub converged: bool,
}

impl SolveStats {
    fn converged(iterations: usize, residual_norm: f64, initial_residual_norm: f64) -> Self {
        Self {
            iterations,
            residual_norm,
            initial_residual_norm,
            converged: true,
        }
    }
}

/// Report the result: strict configs turn non-convergence into an error,
/// advisory ones log it and hand back the stats.
fn finish(method: &'static str, stats: SolveStats, config: &SolverConfig) -> SolverResult<SolveStats> {
    if stats.converged {
        debug!(
            method,
            iterations = stats.iterations,
            residual = stats.residual_norm,
            "linear solve converged"
        );
        return Ok(stats);
    }
    if config.strict {
        return Err(SolverError::ConvergenceFailed {
            method,
            iterations: stats.iterations,
            residual: stats.residual_norm,
        });
    }
    warn!(
        method,
        iterations = stats.iterations,
        residual = stats.residual_norm,
        "linear solve did not converge"
    );
    Ok(stats)
}

fn check_dims(op: &dyn LinearOperator, b: &DVector<f64>, x: &DVector<f64>) -> SolverResult<()> {
    let n = op.nrows();
    for (what, len) in [("right-hand side", b.len()), ("solution", x.len())] {
        if len != n {
            return Err(SolverError::DimensionMismatch {
                what,
                expected: n,
                actual: len,
            });
        }
    }
    Ok(())
}

/// Preconditioned conjugate gradient for symmetric positive definite `A`.
///
/// Stops when `r·Br <= max(rel_tol² r0·Br0, abs_tol²)`.
pub fn conjugate_gradient(
    op: &dyn LinearOperator,
    pc: &dyn Preconditioner,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    config: &SolverConfig,
) -> SolverResult<SolveStats> {
    check_dims(op, b, x)?;
    let n = b.len();

    let mut r = b.clone();
    if config.iterative_mode {
        r -= op.matvec(x);
    } else {
        x.fill(0.0);
    }

    let mut z = DVector::zeros(n);
    pc.apply(&r, &mut z);
    let mut d = z.clone();
    let mut nom = z.dot(&r);
    if nom < 0.0 {
        return Err(SolverError::InvalidState {
            what: "preconditioner is not positive definite".to_string(),
        });
    }
    let nom0 = nom;
    let r0 = (nom0 * config.rel_tol * config.rel_tol).max(config.abs_tol * config.abs_tol);
    if nom <= r0 {
        return finish("CG", SolveStats::converged(0, nom.sqrt(), nom0.sqrt()), config);
    }

    let mut ad = DVector::zeros(n);
    for iter in 1..=config.max_iter {
        op.apply(&d, &mut ad);
        let den = d.dot(&ad);
        if den <= 0.0 {
            if d.norm_squared() > 0.0 {
                warn!(iter, "CG: operator is not positive definite (d·Ad = {den:e})");
            }
            return finish(
                "CG",
                SolveStats {
                    iterations: iter,
                    residual_norm: nom.sqrt(),
                    initial_residual_norm: nom0.sqrt(),
                    converged: false,
                },
                config,
            );
        }
        let alpha = nom / den;
        x.axpy(alpha, &d, 1.0);
        r.axpy(-alpha, &ad, 1.0);

        pc.apply(&r, &mut z);
        let betanom = z.dot(&r);
        if betanom <= r0 {
            return finish(
                "CG",
                SolveStats::converged(iter, betanom.max(0.0).sqrt(), nom0.sqrt()),
                config,
            );
        }
        let beta = betanom / nom;
        d.axpy(1.0, &z, beta);
        nom = betanom;
    }

    finish(
        "CG",
        SolveStats {
            iterations: config.max_iter,
            residual_norm: nom.sqrt(),
            initial_residual_norm: nom0.sqrt(),
            converged: false,
        },
        config,
    )
}

/// Left-preconditioned GMRES(m) with Givens rotations, for general
/// (nonsymmetric) `A`.
///
/// Stops when `||B r|| <= max(rel_tol ||B r0||, abs_tol)`.
pub fn gmres(
    op: &dyn LinearOperator,
    pc: &dyn Preconditioner,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    config: &SolverConfig,
) -> SolverResult<SolveStats> {
    check_dims(op, b, x)?;
    let n = b.len();
    let m = config.restart.max(1);

    if !config.iterative_mode {
        x.fill(0.0);
    }

    let mut z = DVector::zeros(n);
    let preconditioned_residual = |x: &DVector<f64>, z: &mut DVector<f64>| {
        let r = b - op.matvec(x);
        pc.apply(&r, z);
        z.norm()
    };

    let mut beta = preconditioned_residual(&*x, &mut z);
    let beta0 = beta;
    let target = (config.rel_tol * beta0).max(config.abs_tol);
    if beta <= target {
        return finish("GMRES", SolveStats::converged(0, beta, beta0), config);
    }

    let mut iterations = 0;
    let mut w = DVector::zeros(n);
    let mut av = DVector::zeros(n);
    while iterations < config.max_iter {
        let mut basis: Vec<DVector<f64>> = Vec::with_capacity(m + 1);
        basis.push(&z / beta);
        let mut h = DMatrix::<f64>::zeros(m + 1, m);
        let mut cs = vec![0.0; m];
        let mut sn = vec![0.0; m];
        let mut g = DVector::<f64>::zeros(m + 1);
        g[0] = beta;

        let mut k_used = 0;
        for k in 0..m {
            iterations += 1;
            op.apply(&basis[k], &mut av);
            pc.apply(&av, &mut w);
            for (j, v) in basis.iter().enumerate() {
                let hjk = w.dot(v);
                h[(j, k)] = hjk;
                w.axpy(-hjk, v, 1.0);
            }
            let h_next = w.norm();
            h[(k + 1, k)] = h_next;

            for j in 0..k {
                let t = cs[j] * h[(j, k)] + sn[j] * h[(j + 1, k)];
                h[(j + 1, k)] = -sn[j] * h[(j, k)] + cs[j] * h[(j + 1, k)];
                h[(j, k)] = t;
            }
            let rho = h[(k, k)].hypot(h[(k + 1, k)]);
            if rho == 0.0 {
                break;
            }
            cs[k] = h[(k, k)] / rho;
            sn[k] = h[(k + 1, k)] / rho;
            h[(k, k)] = rho;
            h[(k + 1, k)] = 0.0;
            g[k + 1] = -sn[k] * g[k];
            g[k] *= cs[k];
            k_used = k + 1;

            let resid = g[k + 1].abs();
            if resid <= target || iterations >= config.max_iter || h_next == 0.0 {
                break;
            }
            basis.push(&w / h_next);
        }

        // Back substitution on the triangularized Hessenberg system.
        let mut y = DVector::<f64>::zeros(k_used);
        for i in (0..k_used).rev() {
            let mut s = g[i];
            for j in (i + 1)..k_used {
                s -= h[(i, j)] * y[j];
            }
            y[i] = s / h[(i, i)];
        }
        for (j, v) in basis.iter().take(k_used).enumerate() {
            x.axpy(y[j], v, 1.0);
        }

        beta = preconditioned_residual(&*x, &mut z);
        if beta <= target {
            return finish("GMRES", SolveStats::converged(iterations, beta, beta0), config);
        }
        if k_used == 0 {
            break;
        }
    }

    finish(
        "GMRES",
        SolveStats {
            iterations,
            residual_norm: beta,
            initial_residual_norm: beta0,
            converged: false,
        },
        config,
    )
}
