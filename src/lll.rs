//! LLL and deep-insertion LLL on an R-window
//!
//! The kernel walks an index `k` through the window, size-reducing column `k`
//! and then looking for an insertion position that would shrink the
//! Gram-Schmidt profile. With `depth == 1` the only candidate position is
//! `k - 1` and the test degenerates to the classical Lovász swap; larger
//! depths allow the deep insertions. Every basis change is a cyclic column
//! shift mirrored into the integer transform, followed by a Givens sweep
//! that repairs the floating factor.

use crate::core::matrix::BlockTransform;
use crate::qr::{retriangularize, RMatrix};
use crate::size_reduce::{size_reduce_column, MIN_DIAG, SIZE_EPS};

/// Run LLL(delta) (or deep-LLL when `depth > 1`) on columns `[lo, hi)` of
/// the window. Returns whether the transform is non-trivial.
///
/// Total: each insertion strictly decreases the window potential, so the
/// loop terminates; a generous step guard covers floating-point pathologies.
pub fn lll_block(
    r: &mut RMatrix,
    u: &mut BlockTransform,
    lo: usize,
    hi: usize,
    delta: f64,
    depth: usize,
) -> bool {
    debug_assert!(depth >= 1);
    if hi - lo <= 1 {
        return false;
    }

    let w = hi - lo;
    let max_steps = 10_000 + 2_000 * w * w;
    let mut steps = 0usize;
    let mut changed = false;

    let mut k = lo + 1;
    while k < hi {
        steps += 1;
        if steps > max_steps {
            log::warn!(
                "LLL block [{}, {}) exceeded {} steps; returning current transform",
                lo,
                hi,
                max_steps
            );
            break;
        }

        size_reduce_column(r, u, k, lo);

        match insertion_position(r, lo, k, delta, depth) {
            None => k += 1,
            Some(j) => {
                r.cyclic_shift_cols(j, k);
                u.cyclic_shift(j, k);
                retriangularize(r, j, k);
                changed = true;
                k = if j > lo { j } else { lo + 1 };
            }
        }
    }

    changed
}

/// Leftmost position `j` in `[max(lo, k - depth), k)` where inserting
/// column `k` shrinks the profile, i.e. `delta * R[j][j]^2` exceeds the
/// squared norm of the projection of vector `k` at position `j`.
/// Underflowed diagonals and borderline tests count as satisfied.
fn insertion_position(r: &RMatrix, lo: usize, k: usize, delta: f64, depth: usize) -> Option<usize> {
    let start = if k - lo > depth { k - depth } else { lo };

    // squared norm of the projection of vector k at `start`
    let mut c: f64 = (start..=k).map(|i| r.at(i, k) * r.at(i, k)).sum();

    for j in start..k {
        let rjj = r.at(j, j);
        let rjj_sq = rjj * rjj;
        if rjj_sq > MIN_DIAG && delta * rjj_sq > c * (1.0 + SIZE_EPS) {
            return Some(j);
        }
        c -= r.at(j, k) * r.at(j, k);
    }
    None
}
