//! Size reduction: the classical column-by-column kernel, Seysen's batched
//! variant, and the reducedness predicates built on top of them.
//!
//! Both kernels mutate a floating R-window and mirror every integer quotient
//! into the accumulated block transform, so the exact and floating
//! representations cannot drift apart: the quotient is clamped to `i64`
//! first and the *clamped* value is applied on both sides.

use crate::core::error::Result;
use crate::core::matrix::{BlockTransform, IntScalar, Matrix};
use crate::qr::{qr_factor, RMatrix};

/// Relative slack accepted by the floating-point reducedness checks.
pub(crate) const SIZE_EPS: f64 = 1e-7;
/// Diagonal entries below this are treated as underflowed.
pub(crate) const MIN_DIAG: f64 = 1e-140;

/// Round to the nearest integer representable as `i64`, ties toward zero.
/// A tie rounded away from zero would flip an exact half-coefficient back
/// and forth between passes and the driver would never see a quiet pass.
/// Saturates on overflow and maps non-finite input to 0 so a single bad
/// quotient cannot poison the transform; the next QR re-derives R anyway.
#[inline]
pub(crate) fn round_quotient(x: f64) -> i64 {
    if !x.is_finite() {
        return 0;
    }
    let t = x.trunc();
    let frac = x - t;
    let r = if frac > 0.5 {
        t + 1.0
    } else if frac < -0.5 {
        t - 1.0
    } else {
        t
    };
    r as i64
}

/// Size-reduce column `j` against columns `lo..j`, updating `r` and `u`
/// with identical elementary operations. Returns whether anything changed.
pub(crate) fn size_reduce_column(
    r: &mut RMatrix,
    u: &mut BlockTransform,
    j: usize,
    lo: usize,
) -> bool {
    let mut changed = false;
    for i in (lo..j).rev() {
        let rii = r.at(i, i);
        if rii.abs() < MIN_DIAG {
            continue;
        }
        let q = round_quotient(r.at(i, j) / rii);
        if q != 0 {
            r.col_sub_mul(j, i, q as f64);
            u.col_sub_mul(j, i, q);
            changed = true;
        }
    }
    changed
}

/// Classical size reduction of the window `[lo, hi)`: after the pass,
/// `|R[i][j]| <= 1/2 |R[i][i]|` for all `lo <= i < j < hi`.
pub fn size_reduce(r: &mut RMatrix, u: &mut BlockTransform, lo: usize, hi: usize) -> bool {
    let mut changed = false;
    for j in lo + 1..hi {
        changed |= size_reduce_column(r, u, j, lo);
    }
    changed
}

/// Seysen's batched size reduction of the window `[lo, hi)`.
///
/// Recursively reduces both halves, then clears the off-diagonal block in
/// one shot: a triangular solve expresses the block in the left half's
/// coordinates and the rounded solution is applied as a single integer
/// column update. Entries on the superdiagonal end up fully reduced; the
/// remaining entries satisfy the weak bound (see `is_weakly_lll_reduced`),
/// which is all the Lovász machinery needs.
pub fn seysen_reduce(r: &mut RMatrix, u: &mut BlockTransform, lo: usize, hi: usize) -> bool {
    if hi - lo <= 1 {
        return false;
    }
    let h = lo + (hi - lo) / 2;
    let mut changed = seysen_reduce(r, u, lo, h);
    changed |= seysen_reduce(r, u, h, hi);

    let mut x = vec![0.0f64; h - lo];
    for col in h..hi {
        for m in (lo..h).rev() {
            let mut s = r.at(m, col);
            for t in m + 1..h {
                s -= r.at(m, t) * x[t - lo];
            }
            let rmm = r.at(m, m);
            x[m - lo] = if rmm.abs() < MIN_DIAG { 0.0 } else { s / rmm };
        }
        for m in lo..h {
            let q = round_quotient(-x[m - lo]);
            if q != 0 {
                r.col_add_mul(col, m, q as f64);
                u.col_add_mul(col, m, q);
                changed = true;
            }
        }
    }
    changed
}

/// Strict size-reducedness of an R-factor: `|R[i][j]| <= (1/2 + eps) R[i][i]`
/// for every pair `i < j`.
pub fn r_is_size_reduced(r: &RMatrix) -> bool {
    let n = r.size();
    for i in 0..n {
        let bound = (0.5 + SIZE_EPS) * r.at(i, i).abs() + MIN_DIAG;
        for j in i + 1..n {
            if r.at(i, j).abs() > bound {
                return false;
            }
        }
    }
    true
}

fn r_superdiagonal_reduced(r: &RMatrix) -> bool {
    let n = r.size();
    (0..n.saturating_sub(1)).all(|i| {
        r.at(i, i + 1).abs() <= (0.5 + SIZE_EPS) * r.at(i, i).abs() + MIN_DIAG
    })
}

pub(crate) fn r_satisfies_lovasz(r: &RMatrix, delta: f64) -> bool {
    let n = r.size();
    for i in 0..n.saturating_sub(1) {
        let lhs = delta * r.at(i, i) * r.at(i, i);
        let rhs = r.at(i + 1, i + 1) * r.at(i + 1, i + 1) + r.at(i, i + 1) * r.at(i, i + 1);
        if lhs > rhs * (1.0 + SIZE_EPS) + MIN_DIAG {
            return false;
        }
    }
    true
}

/// Is the row-basis LLL(delta)-reduced? Checks full size reduction plus the
/// Lovász condition on every adjacent pair, within floating tolerance.
pub fn is_lll_reduced<Z: IntScalar>(basis: &Matrix<Z>, delta: f64) -> Result<bool> {
    let r = qr_factor(&basis.transpose())?;
    Ok(r_is_size_reduced(&r) && r_satisfies_lovasz(&r, delta))
}

/// Weak form of the predicate: only the superdiagonal entries need the
/// half bound. Seysen-reduced bases satisfy this form.
pub fn is_weakly_lll_reduced<Z: IntScalar>(basis: &Matrix<Z>, delta: f64) -> Result<bool> {
    let r = qr_factor(&basis.transpose())?;
    Ok(r_superdiagonal_reduced(&r) && r_satisfies_lovasz(&r, delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::qr_factor;

    fn skewed_window() -> RMatrix {
        // columns (1, 0, 0), (7, 2, 0), (13, 9, 3) as an R-factor
        let mut r = RMatrix::zeros(3);
        r.set(0, 0, 1.0);
        r.set(0, 1, 7.0);
        r.set(1, 1, 2.0);
        r.set(0, 2, 13.0);
        r.set(1, 2, 9.0);
        r.set(2, 2, 3.0);
        r
    }

    #[test]
    fn test_quotient_ties_round_toward_zero() {
        assert_eq!(round_quotient(0.5), 0);
        assert_eq!(round_quotient(-0.5), 0);
        assert_eq!(round_quotient(0.51), 1);
        assert_eq!(round_quotient(-1.5), -1);
        assert_eq!(round_quotient(2.5), 2);
        assert_eq!(round_quotient(f64::NAN), 0);
    }

    #[test]
    fn test_classical_size_reduce() {
        let mut r = skewed_window();
        let mut u = BlockTransform::identity(3);
        assert!(size_reduce(&mut r, &mut u, 0, 3));
        assert!(r_is_size_reduced(&r));
        assert_eq!(u.to_matrix().determinant().unwrap().abs(), 1);
        // diagonal untouched
        assert_eq!(r.at(0, 0), 1.0);
        assert_eq!(r.at(1, 1), 2.0);
        assert_eq!(r.at(2, 2), 3.0);
    }

    #[test]
    fn test_size_reduce_is_idempotent() {
        let mut r = skewed_window();
        let mut u = BlockTransform::identity(3);
        size_reduce(&mut r, &mut u, 0, 3);
        let mut u2 = BlockTransform::identity(3);
        assert!(!size_reduce(&mut r, &mut u2, 0, 3));
        assert!(u2.is_identity());
    }

    #[test]
    fn test_seysen_reduce() {
        let mut r = skewed_window();
        let mut u = BlockTransform::identity(3);
        assert!(seysen_reduce(&mut r, &mut u, 0, 3));
        // superdiagonal strictly reduced, everything else within the weak bound
        assert!(r.at(0, 1).abs() <= 0.5 * r.at(0, 0) + 1e-9);
        assert!(r.at(1, 2).abs() <= 0.5 * r.at(1, 1) + 1e-9);
        assert_eq!(u.to_matrix().determinant().unwrap().abs(), 1);
    }

    #[test]
    fn test_seysen_matches_classical_on_2x2() {
        let mut r1 = RMatrix::zeros(2);
        r1.set(0, 0, 3.0);
        r1.set(0, 1, 10.0);
        r1.set(1, 1, 1.0);
        let mut r2 = r1.clone();

        let mut u1 = BlockTransform::identity(2);
        let mut u2 = BlockTransform::identity(2);
        size_reduce(&mut r1, &mut u1, 0, 2);
        seysen_reduce(&mut r2, &mut u2, 0, 2);
        assert_eq!(u1, u2);
        assert!((r1.at(0, 1) - r2.at(0, 1)).abs() < 1e-12);
    }

    #[test]
    fn test_lll_predicates() {
        let identity: Matrix = Matrix::identity(3);
        assert!(is_lll_reduced(&identity, 0.99).unwrap());

        let skew: Matrix = Matrix::new(vec![vec![1, 0], vec![100, 1]]).unwrap();
        assert!(!is_lll_reduced(&skew, 0.99).unwrap());
        assert!(!is_weakly_lll_reduced(&skew, 0.99).unwrap());
    }

    #[test]
    fn test_lovasz_check_on_sorted_diagonal() {
        let asc: Matrix = Matrix::new(vec![
            vec![97, 0, 0],
            vec![0, 98, 0],
            vec![0, 0, 100],
        ])
        .unwrap();
        assert!(is_lll_reduced(&asc, 0.99).unwrap());

        let desc = asc.transpose(); // same entries, still diagonal
        assert!(is_lll_reduced(&desc, 0.99).unwrap());

        let steep: Matrix = Matrix::new(vec![vec![100, 0], vec![0, 50]]).unwrap();
        assert!(!is_lll_reduced(&steep, 0.99).unwrap());
        let r = qr_factor(&steep.transpose()).unwrap();
        assert!(!r_satisfies_lovasz(&r, 0.99));
    }
}
