//! Linear operator abstraction and CSR helpers.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Square linear map `y = A x`.
///
/// Implemented by assembled CSR matrices and by matrix-free operators that
/// apply element contributions on the fly.
pub trait LinearOperator {
    fn nrows(&self) -> usize;

    /// Overwrite `y` with `A x`.
    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>);

    /// Main diagonal of the operator.
    fn diagonal(&self) -> DVector<f64>;

    /// Allocate and return `A x`.
    fn matvec(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = DVector::zeros(self.nrows());
        self.apply(x, &mut y);
        y
    }
}

impl LinearOperator for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        y.fill(0.0);
        spmv_add(1.0, self, x, y);
    }

    fn diagonal(&self) -> DVector<f64> {
        let n = CsrMatrix::nrows(self);
        let offsets = self.row_offsets();
        let cols = self.col_indices();
        let vals = self.values();
        let mut diag = DVector::zeros(n);
        for i in 0..n {
            for k in offsets[i]..offsets[i + 1] {
                if cols[k] == i {
                    diag[i] += vals[k];
                }
            }
        }
        diag
    }
}

/// `y += alpha * A x`.
pub fn spmv_add(alpha: f64, a: &CsrMatrix<f64>, x: &DVector<f64>, y: &mut DVector<f64>) {
    let offsets = a.row_offsets();
    let cols = a.col_indices();
    let vals = a.values();
    for i in 0..a.nrows() {
        let mut sum = 0.0;
        for k in offsets[i]..offsets[i + 1] {
            sum += vals[k] * x[cols[k]];
        }
        y[i] += alpha * sum;
    }
}

/// `alpha * A + beta * B` over the union of both sparsity patterns.
pub fn sparse_add(alpha: f64, a: &CsrMatrix<f64>, beta: f64, b: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    debug_assert_eq!(a.nrows(), b.nrows());
    debug_assert_eq!(a.ncols(), b.ncols());
    let mut coo = CooMatrix::new(a.nrows(), a.ncols());
    for (i, j, v) in a.triplet_iter() {
        coo.push(i, j, alpha * *v);
    }
    for (i, j, v) in b.triplet_iter() {
        coo.push(i, j, beta * *v);
    }
    CsrMatrix::from(&coo)
}

/// Submatrix `A[rows, cols]`. `row_map[i]` / `col_map[j]` give the reduced
/// index of full index `i` / `j`, or `None` when it is dropped.
pub fn restrict(
    a: &CsrMatrix<f64>,
    row_map: &[Option<usize>],
    col_map: &[Option<usize>],
    nrows: usize,
    ncols: usize,
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for (i, j, v) in a.triplet_iter() {
        if let (Some(ri), Some(cj)) = (row_map[i], col_map[j]) {
            coo.push(ri, cj, *v);
        }
    }
    CsrMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tridiag(n: usize, lo: f64, d: f64, hi: f64) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, d);
            if i > 0 {
                coo.push(i, i - 1, lo);
            }
            if i + 1 < n {
                coo.push(i, i + 1, hi);
            }
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn csr_apply_matches_dense() {
        let a = tridiag(4, -1.0, 2.0, -1.0);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let y = a.matvec(&x);
        assert_eq!(y, DVector::from_vec(vec![0.0, 0.0, 0.0, 5.0]));
        assert_eq!(a.diagonal(), DVector::from_element(4, 2.0));
    }

    #[test]
    fn restrict_drops_rows_and_columns() {
        let a = tridiag(3, -1.0, 2.0, -1.0);
        let map = [Some(0), None, Some(1)];
        let r = restrict(&a, &map, &map, 2, 2);
        let dense = nalgebra::DMatrix::from(&r);
        assert_eq!(dense, nalgebra::DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]));
    }

    proptest! {
        #[test]
        fn sparse_add_is_linear(alpha in -3.0f64..3.0, beta in -3.0f64..3.0, n in 1usize..8) {
            let a = tridiag(n, -1.0, 2.0, -1.0);
            let b = tridiag(n, 0.5, 1.0, 0.0);
            let c = sparse_add(alpha, &a, beta, &b);
            let x = DVector::from_fn(n, |i, _| 1.0 + i as f64);
            let lhs = c.matvec(&x);
            let rhs = a.matvec(&x) * alpha + b.matvec(&x) * beta;
            prop_assert!((lhs - rhs).norm() < 1e-10);
        }
    }
}
