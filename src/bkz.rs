//! BKZ block kernel
//!
//! Slides a width-`beta` window across the R-block. At each start the
//! profile behind the window is LLL-cleaned, the window is enumerated with
//! the compiled-in pruning profile and radius `delta * R[j][j]^2`, and a
//! successful candidate is folded into the basis: the combination is written
//! into its last touched column (unit leading coefficient), cyclically
//! shifted to the front of the window, re-triangularized, and the window is
//! re-run through LLL. The kernel emits one cumulative transform; tour
//! counting belongs to the driver.

use crate::core::error::Result;
use crate::core::matrix::BlockTransform;
use crate::lll::lll_block;
use crate::pruning;
use crate::qr::{retriangularize, RMatrix};
use crate::size_reduce::MIN_DIAG;
use crate::svp::{enumerate, enumerate_last_one, EnumSolution};

/// One BKZ sweep over the window `[0, w)` with block size `beta`.
pub fn bkz_block(
    r: &mut RMatrix,
    u: &mut BlockTransform,
    delta: f64,
    beta: usize,
) -> Result<bool> {
    let w = r.size();
    if w < 2 {
        return Ok(false);
    }
    let beta = beta.min(w);
    if beta < 2 {
        return Ok(lll_block(r, u, 0, w, delta, 1));
    }

    let pruning = pruning::coefficients(beta);
    let mut changed = false;

    for j in 0..=w - beta {
        changed |= lll_block(r, u, j, w, delta, 1);

        let rjj = r.at(j, j);
        let radius_sq = delta * rjj * rjj;
        if radius_sq < MIN_DIAG {
            continue;
        }

        let hi = j + beta;
        let found = enumerate(r, j, hi, &pruning, radius_sq)?;
        let insertion = match found {
            Some(sol) => unit_leading(sol, r, j, hi, &pruning, radius_sq)?,
            None => None,
        };

        if let Some(sol) = insertion {
            let t = last_nonzero(&sol.coeffs);
            debug_assert_eq!(sol.coeffs[t], 1);
            for (s, &c) in sol.coeffs.iter().enumerate().take(t) {
                if c != 0 {
                    r.col_add_mul(j + t, j + s, c as f64);
                    u.col_add_mul(j + t, j + s, c);
                }
            }
            r.cyclic_shift_cols(j, j + t);
            u.cyclic_shift(j, j + t);
            retriangularize(r, j, j + t);
            lll_block(r, u, j, hi, delta, 1);
            changed = true;
        }
    }

    Ok(changed)
}

fn last_nonzero(coeffs: &[i64]) -> usize {
    coeffs
        .iter()
        .rposition(|&c| c != 0)
        .expect("enumeration never returns the zero vector")
}

/// Normalize a solution to a unit leading coefficient so it can be folded
/// with plain column additions. If the leading coefficient is not a unit,
/// re-enumerate with that coordinate pinned to 1; when nothing comparable
/// exists there, the insertion is skipped for this window start.
fn unit_leading(
    sol: EnumSolution,
    r: &RMatrix,
    lo: usize,
    hi: usize,
    pruning: &[f64],
    radius_sq: f64,
) -> Result<Option<EnumSolution>> {
    let t = last_nonzero(&sol.coeffs);
    match sol.coeffs[t] {
        1 => Ok(Some(sol)),
        -1 => Ok(Some(EnumSolution {
            coeffs: sol.coeffs.iter().map(|&c| -c).collect(),
            norm_sq: sol.norm_sq,
        })),
        _ => {
            let pinned = enumerate_last_one(r, lo, hi, t, pruning, radius_sq)?;
            if pinned.is_none() {
                log::debug!(
                    "no unit-leading equivalent in [{}, {}); insertion skipped",
                    lo,
                    hi
                );
            }
            Ok(pinned)
        }
    }
}
