//! Gauss-Legendre quadrature on the unit interval.

use std::f64::consts::PI;

/// `n`-point Gauss-Legendre rule mapped to `[0, 1]`. Exact for polynomials of
/// degree `2n - 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussLegendre {
    points: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    pub fn new(n: usize) -> Self {
        let n = n.max(1);
        let mut points = vec![0.0; n];
        let mut weights = vec![0.0; n];
        // Roots are symmetric, so only the first half needs Newton.
        for i in 0..n.div_ceil(2) {
            let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut dp = 1.0;
            for _ in 0..100 {
                let (p, d) = legendre(n, x);
                dp = d;
                let dx = p / d;
                x -= dx;
                if dx.abs() < 1e-15 {
                    break;
                }
            }
            let (_, d) = legendre(n, x);
            if d != 0.0 {
                dp = d;
            }
            let w = 2.0 / ((1.0 - x * x) * dp * dp);
            points[i] = 0.5 * (1.0 - x);
            points[n - 1 - i] = 0.5 * (1.0 + x);
            weights[i] = 0.5 * w;
            weights[n - 1 - i] = 0.5 * w;
        }
        Self { points, weights }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `(point, weight)` pairs in increasing point order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied().zip(self.weights.iter().copied())
    }
}

/// `P_n(x)` and `P_n'(x)` by the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn weights_sum_to_one() {
        for n in 1..12 {
            let rule = GaussLegendre::new(n);
            let total: f64 = rule.weights().iter().sum();
            assert!((total - 1.0).abs() < 1e-13, "n = {n}: {total}");
        }
    }

    #[test]
    fn two_point_rule_matches_closed_form() {
        let rule = GaussLegendre::new(2);
        let offset = 0.5 / 3f64.sqrt();
        assert!((rule.points()[0] - (0.5 - offset)).abs() < 1e-15);
        assert!((rule.points()[1] - (0.5 + offset)).abs() < 1e-15);
    }

    #[test]
    fn odd_rule_contains_midpoint() {
        let rule = GaussLegendre::new(5);
        assert!((rule.points()[2] - 0.5).abs() < 1e-15);
    }

    proptest! {
        #[test]
        fn exact_for_monomials_up_to_degree_2n_minus_1(n in 1usize..10, k_frac in 0.0f64..1.0) {
            let k = ((2 * n - 1) as f64 * k_frac).floor() as i32;
            let rule = GaussLegendre::new(n);
            let approx: f64 = rule.iter().map(|(x, w)| w * x.powi(k)).sum();
            let exact = 1.0 / (k as f64 + 1.0);
            prop_assert!((approx - exact).abs() < 1e-12);
        }
    }
}
