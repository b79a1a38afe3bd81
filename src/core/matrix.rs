//! Exact integer matrices and elementary unimodular block transforms
//!
//! The fixed-width scalar is `i64` with checked arithmetic; overflow is
//! reported so the caller can retry with `rug::Integer` (behind the
//! `high-precision` feature). Both scalars sit behind [`IntScalar`], so the
//! kernel contract is identical in either mode.

use crate::core::error::{ReduceError, Result};
use rayon::prelude::*;

/// Integer scalar usable by the exact kernel.
///
/// `checked_*` return `None` on overflow in the fixed-width implementation
/// and never fail for arbitrary-precision scalars.
pub trait IntScalar:
    Clone + PartialEq + Send + Sync + std::fmt::Debug + std::fmt::Display + 'static
{
    fn zero() -> Self;
    fn one() -> Self;
    fn from_i64(v: i64) -> Self;
    fn is_zero(&self) -> bool;
    fn to_f64(&self) -> f64;
    fn checked_add(&self, rhs: &Self) -> Option<Self>;
    fn checked_sub(&self, rhs: &Self) -> Option<Self>;
    fn checked_mul(&self, rhs: &Self) -> Option<Self>;
    fn checked_mul_i64(&self, rhs: i64) -> Option<Self>;
}

impl IntScalar for i64 {
    fn zero() -> Self {
        0
    }

    fn one() -> Self {
        1
    }

    fn from_i64(v: i64) -> Self {
        v
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn to_f64(&self) -> f64 {
        *self as f64
    }

    fn checked_add(&self, rhs: &Self) -> Option<Self> {
        i64::checked_add(*self, *rhs)
    }

    fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        i64::checked_sub(*self, *rhs)
    }

    fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        i64::checked_mul(*self, *rhs)
    }

    fn checked_mul_i64(&self, rhs: i64) -> Option<Self> {
        i64::checked_mul(*self, rhs)
    }
}

#[cfg(feature = "high-precision")]
impl IntScalar for rug::Integer {
    fn zero() -> Self {
        rug::Integer::new()
    }

    fn one() -> Self {
        rug::Integer::from(1)
    }

    fn from_i64(v: i64) -> Self {
        rug::Integer::from(v)
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn to_f64(&self) -> f64 {
        rug::Integer::to_f64(self)
    }

    fn checked_add(&self, rhs: &Self) -> Option<Self> {
        Some(rug::Integer::from(self + rhs))
    }

    fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        Some(rug::Integer::from(self - rhs))
    }

    fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        Some(rug::Integer::from(self * rhs))
    }

    fn checked_mul_i64(&self, rhs: i64) -> Option<Self> {
        Some(rug::Integer::from(self * rhs))
    }
}

/// Dense integer matrix, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<Z: IntScalar = i64> {
    data: Vec<Vec<Z>>,
    rows: usize,
    cols: usize,
}

impl<Z: IntScalar> Matrix<Z> {
    /// Create a matrix from row vectors, checking that it is rectangular
    pub fn new(data: Vec<Vec<Z>>) -> Result<Self> {
        if data.is_empty() {
            return Err(ReduceError::invalid_input("matrix cannot be empty"));
        }

        let rows = data.len();
        let cols = data[0].len();
        for (i, row) in data.iter().enumerate() {
            if row.len() != cols {
                return Err(ReduceError::invalid_input(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
        }

        Ok(Matrix { data, rows, cols })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![vec![Z::zero(); cols]; rows],
            rows,
            cols,
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut data = vec![vec![Z::zero(); n]; n];
        for (i, row) in data.iter_mut().enumerate() {
            row[i] = Z::one();
        }
        Matrix { data, rows: n, cols: n }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Z> {
        self.data.get(row)?.get(col)
    }

    pub fn row(&self, row: usize) -> &[Z] {
        &self.data[row]
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn is_identity(&self) -> bool {
        self.is_square()
            && self.data.iter().enumerate().all(|(i, row)| {
                row.iter()
                    .enumerate()
                    .all(|(j, v)| if i == j { *v == Z::one() } else { v.is_zero() })
            })
    }

    pub fn transpose(&self) -> Self {
        let mut data = vec![vec![Z::zero(); self.rows]; self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                data[j][i] = self.data[i][j].clone();
            }
        }
        Matrix {
            data,
            rows: self.cols,
            cols: self.rows,
        }
    }

    pub fn to_vec(&self) -> Vec<Vec<Z>> {
        self.data.clone()
    }

    /// Exact matrix product `self · other`
    pub fn mul(&self, other: &Matrix<Z>) -> Result<Matrix<Z>> {
        if self.cols != other.rows {
            return Err(ReduceError::invalid_input(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }

        let mut data = vec![vec![Z::zero(); other.cols]; self.rows];
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut acc = Z::zero();
                for k in 0..self.cols {
                    let term = self.data[i][k]
                        .checked_mul(&other.data[k][j])
                        .ok_or_else(overflow_in_product)?;
                    acc = acc.checked_add(&term).ok_or_else(overflow_in_product)?;
                }
                data[i][j] = acc;
            }
        }

        Ok(Matrix {
            data,
            rows: self.rows,
            cols: other.cols,
        })
    }

    /// In-place right-multiply of a column strip:
    /// `self[:, lo..hi] := self[:, lo..hi] · uw`.
    ///
    /// Rows are independent, so the update runs in parallel across them.
    /// Safe to call concurrently on disjoint strips of different matrices;
    /// the driver sequences strips of the same matrix.
    pub fn right_mul_strip(&mut self, lo: usize, hi: usize, uw: &BlockTransform) -> Result<()> {
        let w = hi - lo;
        if uw.size() != w || hi > self.cols {
            return Err(ReduceError::invalid_input(format!(
                "strip [{}, {}) does not match a {}x{} transform on {} columns",
                lo,
                hi,
                uw.size(),
                uw.size(),
                self.cols
            )));
        }

        self.data.par_iter_mut().try_for_each(|row| {
            let old: Vec<Z> = row[lo..hi].to_vec();
            for c in 0..w {
                let mut acc = Z::zero();
                for (k, entry) in old.iter().enumerate() {
                    let m = uw.at(k, c);
                    if m == 0 {
                        continue;
                    }
                    let term = entry.checked_mul_i64(m).ok_or_else(overflow_in_product)?;
                    acc = acc.checked_add(&term).ok_or_else(overflow_in_product)?;
                }
                row[lo + c] = acc;
            }
            Ok(())
        })
    }

    /// Exact determinant by cofactor expansion. Intended for the small
    /// matrices used in validation and tests; cost grows factorially.
    pub fn determinant(&self) -> Result<Z> {
        if !self.is_square() {
            return Err(ReduceError::invalid_input(
                "determinant requires a square matrix",
            ));
        }
        let idx: Vec<usize> = (0..self.cols).collect();
        self.det_on(&(0..self.rows).collect::<Vec<_>>(), &idx)
    }

    fn det_on(&self, rows: &[usize], cols: &[usize]) -> Result<Z> {
        let n = rows.len();
        if n == 1 {
            return Ok(self.data[rows[0]][cols[0]].clone());
        }

        let mut det = Z::zero();
        for (j, &col) in cols.iter().enumerate() {
            let v = &self.data[rows[0]][col];
            if v.is_zero() {
                continue;
            }
            let sub_cols: Vec<usize> = cols
                .iter()
                .copied()
                .filter(|&c| c != col)
                .collect();
            let minor = self.det_on(&rows[1..], &sub_cols)?;
            let term = v.checked_mul(&minor).ok_or_else(overflow_in_product)?;
            det = if j % 2 == 0 {
                det.checked_add(&term).ok_or_else(overflow_in_product)?
            } else {
                det.checked_sub(&term).ok_or_else(overflow_in_product)?
            };
        }
        Ok(det)
    }
}

fn overflow_in_product() -> ReduceError {
    ReduceError::overflow(
        "entry exceeds i64 during exact composition; retry with arbitrary precision",
    )
}

impl<Z: IntScalar> std::fmt::Display for Matrix<Z> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Matrix {}x{}:", self.rows, self.cols)?;
        for row in &self.data {
            writeln!(
                f,
                "[{}]",
                row.iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }
        Ok(())
    }
}

/// Contiguous `w x w` integer transform accumulated by a block kernel.
///
/// Every mutation is an elementary unimodular column operation, so the
/// transform stays unimodular by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTransform {
    n: usize,
    data: Vec<i64>,
}

impl BlockTransform {
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0i64; n * n];
        for i in 0..n {
            data[i * n + i] = 1;
        }
        BlockTransform { n, data }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.n + col]
    }

    pub fn is_identity(&self) -> bool {
        self.data.iter().enumerate().all(|(idx, &v)| {
            let (r, c) = (idx / self.n, idx % self.n);
            v == if r == c { 1 } else { 0 }
        })
    }

    /// `col[dst] -= q * col[src]`
    pub fn col_sub_mul(&mut self, dst: usize, src: usize, q: i64) {
        for r in 0..self.n {
            self.data[r * self.n + dst] -= q * self.data[r * self.n + src];
        }
    }

    /// `col[dst] += q * col[src]`
    pub fn col_add_mul(&mut self, dst: usize, src: usize, q: i64) {
        for r in 0..self.n {
            self.data[r * self.n + dst] += q * self.data[r * self.n + src];
        }
    }

    /// Move column `k` to position `j`, shifting columns `j..k` one to the
    /// right (the column part of a deep insertion).
    pub fn cyclic_shift(&mut self, j: usize, k: usize) {
        debug_assert!(j <= k && k < self.n);
        for r in 0..self.n {
            let base = r * self.n;
            let moved = self.data[base + k];
            for c in (j + 1..=k).rev() {
                self.data[base + c] = self.data[base + c - 1];
            }
            self.data[base + j] = moved;
        }
    }

    /// Copy into a square [`Matrix<i64>`], mainly for determinant checks.
    pub fn to_matrix(&self) -> Matrix<i64> {
        let data = (0..self.n)
            .map(|r| self.data[r * self.n..(r + 1) * self.n].to_vec())
            .collect();
        Matrix::new(data).expect("square by construction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_creation() {
        let m: Matrix = Matrix::new(vec![vec![1, 2], vec![3, 4]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 2);
        assert!(Matrix::<i64>::new(vec![vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn test_matrix_mul() {
        let a: Matrix = Matrix::new(vec![vec![1, 2], vec![3, 4]]).unwrap();
        let b: Matrix = Matrix::new(vec![vec![5, 6], vec![7, 8]]).unwrap();
        let c = a.mul(&b).unwrap();
        assert_eq!(c.get(0, 0), Some(&19));
        assert_eq!(c.get(1, 1), Some(&50));
    }

    #[test]
    fn test_mul_overflow_is_reported() {
        let a: Matrix = Matrix::new(vec![vec![i64::MAX, 0], vec![0, 1]]).unwrap();
        let b: Matrix = Matrix::new(vec![vec![2, 0], vec![0, 1]]).unwrap();
        assert!(matches!(a.mul(&b), Err(ReduceError::Overflow(_))));
    }

    #[test]
    fn test_right_mul_strip() {
        let mut m: Matrix = Matrix::new(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        // swap the last two columns via a transform
        let mut uw = BlockTransform::identity(2);
        uw.cyclic_shift(0, 1);
        m.right_mul_strip(1, 3, &uw).unwrap();
        assert_eq!(m.row(0), &[1, 3, 2]);
        assert_eq!(m.row(1), &[4, 6, 5]);
    }

    #[test]
    fn test_determinant() {
        let m: Matrix = Matrix::new(vec![
            vec![1, 2, 3],
            vec![0, 1, 4],
            vec![5, 6, 0],
        ])
        .unwrap();
        assert_eq!(m.determinant().unwrap(), 1);
    }

    #[test]
    fn test_block_transform_ops() {
        let mut u = BlockTransform::identity(3);
        assert!(u.is_identity());

        u.col_sub_mul(2, 0, 5);
        assert_eq!(u.at(0, 2), -5);
        let det = u.to_matrix().determinant().unwrap();
        assert_eq!(det.abs(), 1);

        u.cyclic_shift(0, 2);
        let det = u.to_matrix().determinant().unwrap();
        assert_eq!(det.abs(), 1);
    }

    #[cfg(feature = "high-precision")]
    #[test]
    fn test_bigint_scalar() {
        use rug::Integer;
        let a: Matrix<Integer> = Matrix::new(vec![
            vec![Integer::from(i64::MAX), Integer::from(0)],
            vec![Integer::from(0), Integer::from(1)],
        ])
        .unwrap();
        let b: Matrix<Integer> = Matrix::new(vec![
            vec![Integer::from(2), Integer::from(0)],
            vec![Integer::from(0), Integer::from(1)],
        ])
        .unwrap();
        // the same product that overflows i64 succeeds here
        let c = a.mul(&b).unwrap();
        assert_eq!(*c.get(0, 0).unwrap(), Integer::from(i64::MAX) * 2);
    }
}
