//! QR factorization of the basis into a floating R-factor
//!
//! The driver keeps the basis in column convention (column `j` is lattice
//! vector `j`), so the R-factor of a QR of that matrix has `R[i][i] = |b*_i|`
//! and column `j` holds the Gram-Schmidt coefficients of vector `j`.
//! Householder reflections are used rather than a Gram/Cholesky pass: they
//! keep the working precision on the vectors themselves instead of on their
//! squared norms, which is what goes wrong first on long, skewed bases.

use crate::core::error::{ReduceError, Result};
use crate::core::matrix::{IntScalar, Matrix};

/// Dense upper-triangular R-factor with positive diagonal, row-major `f64`.
///
/// Kernels mutate it with the same elementary column operations they apply to
/// their integer transform, plus Givens row rotations to repair triangularity
/// after swaps and insertions (row rotations act on the Q side and need no
/// integer mirror).
#[derive(Debug, Clone)]
pub struct RMatrix {
    n: usize,
    data: Vec<f64>,
}

impl RMatrix {
    pub fn zeros(n: usize) -> Self {
        RMatrix {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: f64) {
        self.data[row * self.n + col] = v;
    }

    pub fn diag(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.at(i, i)).collect()
    }

    /// Copy of the square sub-block `[lo, hi) x [lo, hi)`, which is exactly
    /// the R-factor of the lattice projected at position `lo`.
    pub fn window(&self, lo: usize, hi: usize) -> RMatrix {
        let w = hi - lo;
        let mut out = RMatrix::zeros(w);
        for i in 0..w {
            for j in i..w {
                out.set(i, j, self.at(lo + i, lo + j));
            }
        }
        out
    }

    /// `col[dst] -= q * col[src]`; column `src` has entries in rows `0..=src`.
    pub fn col_sub_mul(&mut self, dst: usize, src: usize, q: f64) {
        for r in 0..=src {
            let v = self.at(r, src);
            if v != 0.0 {
                let cur = self.at(r, dst);
                self.set(r, dst, cur - q * v);
            }
        }
    }

    /// `col[dst] += q * col[src]`
    pub fn col_add_mul(&mut self, dst: usize, src: usize, q: f64) {
        for r in 0..=src {
            let v = self.at(r, src);
            if v != 0.0 {
                let cur = self.at(r, dst);
                self.set(r, dst, cur + q * v);
            }
        }
    }

    /// Move column `k` to position `j`, shifting columns `j..k` right.
    /// Leaves the matrix upper-Hessenberg on `[j, k]`; callers follow with
    /// [`retriangularize`].
    pub fn cyclic_shift_cols(&mut self, j: usize, k: usize) {
        debug_assert!(j <= k && k < self.n);
        for r in 0..=k {
            let base = r * self.n;
            let moved = self.data[base + k];
            for c in (j + 1..=k).rev() {
                self.data[base + c] = self.data[base + c - 1];
            }
            self.data[base + j] = moved;
        }
    }

    /// Apply the Givens rotation `(c, s)` to rows `i` and `i + 1`, columns
    /// `col_lo..n`.
    pub fn rot_rows(&mut self, i: usize, c: f64, s: f64, col_lo: usize) {
        for col in col_lo..self.n {
            let x = self.at(i, col);
            let y = self.at(i + 1, col);
            self.set(i, col, c * x + s * y);
            self.set(i + 1, col, -s * x + c * y);
        }
    }

    pub fn negate_row_tail(&mut self, row: usize, col_lo: usize) {
        for col in col_lo..self.n {
            let v = self.at(row, col);
            self.set(row, col, -v);
        }
    }
}

/// Restore upper-triangular form on columns `[j, k]` after a cyclic shift
/// (or after BKZ folded a combination into column `k`): a bottom-up sweep of
/// adjacent Givens rotations eliminates the sub-diagonal fill, then row
/// negations restore the positive diagonal.
pub fn retriangularize(r: &mut RMatrix, j: usize, k: usize) {
    for i in (j..k).rev() {
        let a = r.at(i, j);
        let b = r.at(i + 1, j);
        if b.abs() < f64::MIN_POSITIVE {
            r.set(i + 1, j, 0.0);
            continue;
        }
        let h = a.hypot(b);
        r.rot_rows(i, a / h, b / h, j);
        r.set(i + 1, j, 0.0);
    }
    for t in j..=k {
        if r.at(t, t) < 0.0 {
            r.negate_row_tail(t, t);
        }
    }
}

/// Householder QR of the column-convention basis.
///
/// Returns the upper-triangular factor with positive diagonal, or
/// [`ReduceError::Numerical`] when the basis is numerically rank-deficient
/// (or its entries exceed the range of `f64`).
pub fn qr_factor<Z: IntScalar>(basis: &Matrix<Z>) -> Result<RMatrix> {
    let n = basis.rows();
    debug_assert!(basis.is_square());

    let mut a = vec![0.0f64; n * n];
    let mut scale = 0.0f64;
    for i in 0..n {
        for j in 0..n {
            let v = basis.row(i)[j].to_f64();
            if !v.is_finite() {
                return Err(ReduceError::numerical(
                    "basis entry exceeds the range of f64",
                ));
            }
            a[i * n + j] = v;
            scale = scale.max(v.abs());
        }
    }
    if scale == 0.0 {
        return Err(ReduceError::numerical("zero basis"));
    }
    let tol = scale * (n as f64) * 1e-14;

    let mut v = vec![0.0f64; n];
    for k in 0..n {
        let mut norm_sq = 0.0;
        for i in k..n {
            norm_sq += a[i * n + k] * a[i * n + k];
        }
        let norm = norm_sq.sqrt();
        if norm <= tol {
            return Err(ReduceError::numerical(format!(
                "numerically rank-deficient basis at column {}",
                k
            )));
        }

        let alpha = if a[k * n + k] > 0.0 { -norm } else { norm };
        for i in k..n {
            v[i] = a[i * n + k];
        }
        v[k] -= alpha;
        let vtv: f64 = (k..n).map(|i| v[i] * v[i]).sum();

        if vtv > 0.0 {
            for col in k..n {
                let dot: f64 = (k..n).map(|i| v[i] * a[i * n + col]).sum();
                let f = 2.0 * dot / vtv;
                if f != 0.0 {
                    for i in k..n {
                        a[i * n + col] -= f * v[i];
                    }
                }
            }
        }
        a[k * n + k] = alpha;
        for i in k + 1..n {
            a[i * n + k] = 0.0;
        }
    }

    let mut r = RMatrix::zeros(n);
    for i in 0..n {
        let flip = a[i * n + i] < 0.0;
        for j in i..n {
            let v = a[i * n + j];
            r.set(i, j, if flip { -v } else { v });
        }
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_identity() {
        let b: Matrix = Matrix::identity(4);
        let r = qr_factor(&b).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!((r.at(i, j) - expect).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_qr_known_factor() {
        // columns (3, 4) and (0, 5); Gram = [[25, 20], [20, 25]]
        let b: Matrix = Matrix::new(vec![vec![3, 0], vec![4, 5]]).unwrap();
        let r = qr_factor(&b).unwrap();
        assert!((r.at(0, 0) - 5.0).abs() < 1e-10);
        assert!((r.at(0, 1) - 4.0).abs() < 1e-10);
        assert!((r.at(1, 1) - 3.0).abs() < 1e-10);
        assert_eq!(r.at(1, 0), 0.0);
    }

    #[test]
    fn test_qr_reproduces_gram() {
        let b: Matrix = Matrix::new(vec![
            vec![1, 2, 3],
            vec![2, 3, 4],
            vec![3, 4, 6],
        ])
        .unwrap();
        let r = qr_factor(&b).unwrap();
        // R^T R must equal B^T B entry by entry
        for i in 0..3 {
            for j in 0..3 {
                let gram: f64 = (0..3)
                    .map(|k| (b.row(k)[i] * b.row(k)[j]) as f64)
                    .sum();
                let rtr: f64 = (0..=i.min(j)).map(|k| r.at(k, i) * r.at(k, j)).sum();
                assert!((gram - rtr).abs() < 1e-9, "mismatch at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_qr_rejects_singular() {
        let b: Matrix = Matrix::new(vec![vec![1, 2], vec![2, 4]]).unwrap();
        assert!(matches!(qr_factor(&b), Err(ReduceError::Numerical(_))));
    }

    #[test]
    fn test_retriangularize_after_shift() {
        let b: Matrix = Matrix::new(vec![
            vec![4, 1, 7],
            vec![0, 3, 2],
            vec![0, 0, 2],
        ])
        .unwrap();
        let mut r = qr_factor(&b).unwrap();
        let before: f64 = (0..3).map(|i| r.at(i, i).ln()).sum();

        r.cyclic_shift_cols(0, 2);
        retriangularize(&mut r, 0, 2);

        // triangular again, positive diagonal, determinant preserved
        for i in 0..3 {
            assert!(r.at(i, i) > 0.0);
            for j in 0..i {
                assert!(r.at(i, j).abs() < 1e-12);
            }
        }
        let after: f64 = (0..3).map(|i| r.at(i, i).ln()).sum();
        assert!((before - after).abs() < 1e-9);
    }
}
