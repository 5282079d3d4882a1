//! Lagrange shape functions and their tabulation at quadrature points.

use nalgebra::DMatrix;

use crate::quadrature::GaussLegendre;

/// 1D Lagrange polynomials of degree `order` on equispaced nodes in `[0, 1]`.
#[derive(Clone, Debug)]
pub struct LagrangeBasis1D {
    nodes: Vec<f64>,
}

impl LagrangeBasis1D {
    pub fn new(order: usize) -> Self {
        let order = order.max(1);
        let nodes = (0..=order).map(|i| i as f64 / order as f64).collect();
        Self { nodes }
    }

    pub fn order(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Values of every basis function at `x`.
    pub fn values(&self, x: f64) -> Vec<f64> {
        (0..self.nodes.len())
            .map(|i| {
                self.nodes
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, xj)| (x - xj) / (self.nodes[i] - xj))
                    .product()
            })
            .collect()
    }

    /// Derivatives of every basis function at `x`.
    pub fn derivatives(&self, x: f64) -> Vec<f64> {
        let n = self.nodes.len();
        (0..n)
            .map(|i| {
                let xi = self.nodes[i];
                let mut sum = 0.0;
                for m in (0..n).filter(|&m| m != i) {
                    let mut term = 1.0 / (xi - self.nodes[m]);
                    for j in (0..n).filter(|&j| j != i && j != m) {
                        term *= (x - self.nodes[j]) / (xi - self.nodes[j]);
                    }
                    sum += term;
                }
                sum
            })
            .collect()
    }
}

/// Tensor-product basis on the unit square tabulated at a tensor Gauss rule.
///
/// Local dof `a = j * (p + 1) + i` is `L_i(xi) L_j(eta)`. Row `q` of each
/// table is quadrature point `q`, column `a` is the basis function.
#[derive(Clone, Debug)]
pub struct ReferenceElement {
    order: usize,
    points: Vec<[f64; 3]>,
    values: DMatrix<f64>,
    d_xi: DMatrix<f64>,
    d_eta: DMatrix<f64>,
}

impl ReferenceElement {
    pub fn new(order: usize, points_1d: usize) -> Self {
        let basis = LagrangeBasis1D::new(order);
        let rule = GaussLegendre::new(points_1d);
        let np = basis.order() + 1;
        let nd = np * np;
        let nq = rule.len() * rule.len();

        let mut points = Vec::with_capacity(nq);
        let mut values = DMatrix::zeros(nq, nd);
        let mut d_xi = DMatrix::zeros(nq, nd);
        let mut d_eta = DMatrix::zeros(nq, nd);
        let mut q = 0;
        for (eta, w_eta) in rule.iter() {
            let (ly, dly) = (basis.values(eta), basis.derivatives(eta));
            for (xi, w_xi) in rule.iter() {
                let (lx, dlx) = (basis.values(xi), basis.derivatives(xi));
                points.push([xi, eta, w_xi * w_eta]);
                for j in 0..np {
                    for i in 0..np {
                        let a = j * np + i;
                        values[(q, a)] = lx[i] * ly[j];
                        d_xi[(q, a)] = dlx[i] * ly[j];
                        d_eta[(q, a)] = lx[i] * dly[j];
                    }
                }
                q += 1;
            }
        }

        Self {
            order: basis.order(),
            points,
            values,
            d_xi,
            d_eta,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_dofs(&self) -> usize {
        self.values.ncols()
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Reference coordinates and weight `[xi, eta, w]` of point `q`.
    pub fn point(&self, q: usize) -> [f64; 3] {
        self.points[q]
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn d_xi(&self) -> &DMatrix<f64> {
        &self.d_xi
    }

    pub fn d_eta(&self) -> &DMatrix<f64> {
        &self.d_eta
    }
}
