//! Schnorr-Euchner enumeration over an R-window
//!
//! Depth-first search for the shortest non-zero integer combination of the
//! window's columns. Coordinates are fixed from the last position downwards;
//! at each level candidates are visited in zig-zag order around the rounded
//! centre, and a branch dies as soon as its partial norm exceeds the pruned
//! radius for its depth. Whenever a full candidate beats the current radius
//! the radius shrinks to that norm and the search continues.
//!
//! Enumeration exists to serve the BKZ kernel; it is deterministic given its
//! inputs and needs no randomness.

use crate::core::error::{ReduceError, Result};
use crate::pruning::MAX_ENUM_N;
use crate::qr::RMatrix;

/// Node budget before the search gives up and returns the best found so far.
const MAX_NODES: u64 = 20_000_000;

/// A non-zero combination found by enumeration, in window coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSolution {
    pub coeffs: Vec<i64>,
    pub norm_sq: f64,
}

struct Search<'a> {
    r: &'a RMatrix,
    lo: usize,
    pruning: &'a [f64],
    bound: f64,
    best: Option<EnumSolution>,
    nodes: u64,
    truncated: bool,
}

impl<'a> Search<'a> {
    /// Visit candidate `xi` at `level`. Returns `false` when the candidate
    /// exceeds the pruned bound, which kills its whole side of the zig-zag.
    fn try_candidate(&mut self, level: usize, xi: i64, c: f64, rll: f64, rho: f64, x: &mut [i64]) -> bool {
        let d = xi as f64 - c;
        let total = rho + d * d * rll * rll;
        if total > self.pruning[level] * self.bound {
            return false;
        }

        self.nodes += 1;
        if self.nodes > MAX_NODES {
            self.truncated = true;
            return true;
        }

        x[level] = xi;
        if level == 0 {
            if total < self.bound && x.iter().any(|&v| v != 0) {
                self.best = Some(EnumSolution {
                    coeffs: x.to_vec(),
                    norm_sq: total,
                });
                self.bound = total;
            }
        } else {
            self.descend(level - 1, total, x);
        }
        true
    }

    fn descend(&mut self, level: usize, rho: f64, x: &mut [i64]) {
        let rll = self.r.at(self.lo + level, self.lo + level);
        let mut s = 0.0;
        for (t, &xt) in x.iter().enumerate().skip(level + 1) {
            if xt != 0 {
                s += self.r.at(self.lo + level, self.lo + t) * xt as f64;
            }
        }
        let c = -s / rll;
        if !c.is_finite() {
            return;
        }
        let centre = c.round() as i64;

        // centre first: it carries the smallest contribution, so if it fails
        // the whole level fails
        if !self.try_candidate(level, centre, c, rll, rho, x) {
            return;
        }
        let mut up_dead = false;
        let mut dn_dead = false;
        let mut off = 1i64;
        while !(up_dead && dn_dead) && !self.truncated {
            if !up_dead && !self.try_candidate(level, centre + off, c, rll, rho, x) {
                up_dead = true;
            }
            if self.truncated {
                break;
            }
            if !dn_dead && !self.try_candidate(level, centre - off, c, rll, rho, x) {
                dn_dead = true;
            }
            off += 1;
        }
    }
}

fn check_window(r: &RMatrix, lo: usize, hi: usize, pruning: &[f64]) -> Result<usize> {
    if lo >= hi || hi > r.size() {
        return Err(ReduceError::invalid_input(format!(
            "enumeration window [{}, {}) out of range for size {}",
            lo,
            hi,
            r.size()
        )));
    }
    let m = hi - lo;
    if m > MAX_ENUM_N {
        return Err(ReduceError::invalid_input(format!(
            "enumeration block size {} exceeds the supported maximum {}",
            m, MAX_ENUM_N
        )));
    }
    if pruning.len() != m {
        return Err(ReduceError::invalid_input(format!(
            "pruning vector has length {}, expected {}",
            pruning.len(),
            m
        )));
    }
    Ok(m)
}

/// Shortest non-zero combination of columns `[lo, hi)` with squared norm
/// strictly below `radius_sq`, or `None` when the (pruned) tree is empty.
pub fn enumerate(
    r: &RMatrix,
    lo: usize,
    hi: usize,
    pruning: &[f64],
    radius_sq: f64,
) -> Result<Option<EnumSolution>> {
    let m = check_window(r, lo, hi, pruning)?;

    let mut search = Search {
        r,
        lo,
        pruning,
        bound: radius_sq,
        best: None,
        nodes: 0,
        truncated: false,
    };
    let mut x = vec![0i64; m];
    search.descend(m - 1, 0.0, &mut x);
    if search.truncated {
        log::warn!(
            "enumeration on [{}, {}) hit the {} node budget; best-so-far returned",
            lo,
            hi,
            MAX_NODES
        );
    }
    Ok(search.best)
}

/// Variant with the leading coordinate fixed: coordinate `last` (relative to
/// the window) is pinned to 1 and everything after it to 0. BKZ uses this
/// when it must insert at a fixed position with a unit leading coefficient.
pub fn enumerate_last_one(
    r: &RMatrix,
    lo: usize,
    hi: usize,
    last: usize,
    pruning: &[f64],
    radius_sq: f64,
) -> Result<Option<EnumSolution>> {
    let m = check_window(r, lo, hi, pruning)?;
    if last >= m {
        return Err(ReduceError::invalid_input(format!(
            "fixed coordinate {} outside window of width {}",
            last, m
        )));
    }

    let rll = r.at(lo + last, lo + last);
    let rho = rll * rll;
    let mut x = vec![0i64; m];
    x[last] = 1;

    if rho >= pruning[last] * radius_sq {
        return Ok(None);
    }
    if last == 0 {
        return Ok(Some(EnumSolution {
            coeffs: x,
            norm_sq: rho,
        }));
    }

    let mut search = Search {
        r,
        lo,
        pruning,
        bound: radius_sq,
        best: None,
        nodes: 0,
        truncated: false,
    };
    search.descend(last - 1, rho, &mut x);
    if search.truncated {
        log::warn!(
            "fixed-coordinate enumeration on [{}, {}) hit the node budget",
            lo,
            hi
        );
    }
    Ok(search.best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix::Matrix;
    use crate::qr::qr_factor;

    fn r_of(rows: Vec<Vec<i64>>) -> RMatrix {
        let m: Matrix = Matrix::new(rows).unwrap();
        qr_factor(&m.transpose()).unwrap()
    }

    #[test]
    fn test_enumerate_orthogonal() {
        let r = r_of(vec![vec![2, 0], vec![0, 1]]);
        let sol = enumerate(&r, 0, 2, &[1.0, 1.0], 10.0).unwrap().unwrap();
        assert!((sol.norm_sq - 1.0).abs() < 1e-9);
        assert_eq!(sol.coeffs[0], 0);
        assert_eq!(sol.coeffs[1].abs(), 1);
    }

    #[test]
    fn test_enumerate_finds_combination() {
        // basis (5, 0), (4, 1): shortest vector is (−1, 1)·B = (-1, 1)
        let r = r_of(vec![vec![5, 0], vec![4, 1]]);
        let sol = enumerate(&r, 0, 2, &[1.0, 1.0], 30.0).unwrap().unwrap();
        assert!((sol.norm_sq - 2.0).abs() < 1e-9);
        assert_eq!(sol.coeffs[1].abs(), 1);
    }

    #[test]
    fn test_enumerate_respects_radius() {
        let r = r_of(vec![vec![3, 0], vec![0, 4]]);
        // nothing strictly shorter than 3 inside radius^2 = 9
        assert!(enumerate(&r, 0, 2, &[1.0, 1.0], 9.0).unwrap().is_none());
        let sol = enumerate(&r, 0, 2, &[1.0, 1.0], 9.1).unwrap().unwrap();
        assert!((sol.norm_sq - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_enumerate_subwindow() {
        let r = r_of(vec![
            vec![1, 0, 0],
            vec![0, 6, 0],
            vec![0, 0, 5],
        ]);
        let sol = enumerate(&r, 1, 3, &[1.0, 1.0], 100.0).unwrap().unwrap();
        assert!((sol.norm_sq - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_last_one_fixes_coordinate() {
        let r = r_of(vec![vec![1, 0], vec![0, 2]]);
        let sol = enumerate_last_one(&r, 0, 2, 1, &[1.0, 1.0], 100.0)
            .unwrap()
            .unwrap();
        assert_eq!(sol.coeffs[1], 1);
        assert!((sol.norm_sq - 4.0).abs() < 1e-9);

        // radius below the fixed contribution: no solution
        assert!(enumerate_last_one(&r, 0, 2, 1, &[1.0, 1.0], 3.9)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_oversized_block_rejected() {
        let r = RMatrix::zeros(MAX_ENUM_N + 1);
        let pruning = vec![1.0; MAX_ENUM_N + 1];
        assert!(matches!(
            enumerate(&r, 0, MAX_ENUM_N + 1, &pruning, 1.0),
            Err(ReduceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_pruning_length_checked() {
        let r = r_of(vec![vec![1, 0], vec![0, 1]]);
        assert!(enumerate(&r, 0, 2, &[1.0], 4.0).is_err());
    }
}
