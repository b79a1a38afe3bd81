//! Segmented parallel lattice basis reduction
//!
//! This crate reduces integer lattice bases with the LLL family of
//! algorithms (classical LLL, deep-insertion LLL, and BKZ with pruned
//! enumeration) using a segmented driver that refactorizes the basis,
//! reduces disjoint blocks of the R-factor in parallel, and stitches the
//! block transforms back together exactly. Every call returns the reduced
//! basis together with the unimodular transform `U` such that
//! `U * B_input = B_reduced` holds in exact integer arithmetic.
//!
//! # Examples
//!
//! Basic LLL reduction:
//! ```rust
//! use lattice_reducer::{lll_reduce, ReduceParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let basis = vec![
//!     vec![1, 2, 3],
//!     vec![2, 3, 4],
//!     vec![3, 4, 6],
//! ];
//! let result = lll_reduce(basis, &ReduceParams::default())?;
//! println!("rhf = {:.4}", result.metrics.rhf);
//! # Ok(())
//! # }
//! ```
//!
//! BKZ with a custom block size:
//! ```rust
//! use lattice_reducer::{bkz_reduce, ReduceParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let basis = vec![
//!     vec![9, 0, 0, 0],
//!     vec![4, 7, 0, 0],
//!     vec![1, 2, 8, 0],
//!     vec![5, 3, 2, 6],
//! ];
//! let result = bkz_reduce(basis, 3, 2, &ReduceParams::default())?;
//! println!("first vector norm = {:.2}", result.metrics.first_norm);
//! # Ok(())
//! # }
//! ```
//!
//! The fixed-width `i64` path reports [`ReduceError::Overflow`] when entry
//! growth exceeds 64 bits; enable the `high-precision` feature and call
//! [`Reducer::reduce`] with a `Matrix<rug::Integer>` to lift the limit.

pub mod core;
pub mod qr;
pub mod size_reduce;
pub mod lll;
pub mod svp;
pub mod pruning;
pub mod bkz;
pub mod driver;
pub mod metrics;
pub mod utils;

pub use crate::core::error::{ReduceError, Result};
pub use crate::core::matrix::{BlockTransform, IntScalar, Matrix};
pub use crate::driver::{Algorithm, Reducer, ReduceParams, Reduction, ReductionStatus};
pub use crate::metrics::{Metrics, TimeProfile};
pub use crate::pruning::MAX_ENUM_N;
pub use crate::size_reduce::is_weakly_lll_reduced;
pub use crate::svp::EnumSolution;

/// LLL-reduce a row basis given as nested vectors.
///
/// The algorithm in `params` is overridden to the one implied by the call;
/// every other option is honored.
pub fn lll_reduce(basis: Vec<Vec<i64>>, params: &ReduceParams) -> Result<Reduction> {
    let matrix = Matrix::new(basis)?;
    let params = ReduceParams {
        algorithm: match params.algorithm {
            Algorithm::DeepLll { depth } => Algorithm::DeepLll { depth },
            _ => Algorithm::Lll,
        },
        ..params.clone()
    };
    Reducer::with_params(params).reduce(&matrix)
}

/// BKZ-reduce a row basis with block size `beta` and `tours` tours.
pub fn bkz_reduce(
    basis: Vec<Vec<i64>>,
    beta: usize,
    tours: usize,
    params: &ReduceParams,
) -> Result<Reduction> {
    let matrix = Matrix::new(basis)?;
    let params = ReduceParams {
        algorithm: Algorithm::Bkz { beta, tours },
        ..params.clone()
    };
    Reducer::with_params(params).reduce(&matrix)
}

/// Is the row basis LLL(delta)-reduced (size-reduced plus the Lovász
/// condition on every adjacent pair, within floating tolerance)?
pub fn is_lll_reduced(basis: &[Vec<i64>], delta: f64) -> Result<bool> {
    let matrix = Matrix::new(basis.to_vec())?;
    size_reduce::is_lll_reduced(&matrix, delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lll_reduce_surface() {
        let basis = vec![vec![1, 2, 3], vec![2, 3, 4], vec![3, 4, 6]];
        let result = lll_reduce(basis.clone(), &ReduceParams::default()).unwrap();
        assert_eq!(result.status, ReductionStatus::Converged);

        // exact equivalence: U * B_input = B_reduced
        let input = Matrix::new(basis).unwrap();
        let rebuilt = result.transform.mul(&input).unwrap();
        assert_eq!(rebuilt, result.basis);

        assert!(is_lll_reduced(&result.basis.to_vec(), 0.99).unwrap());
    }

    #[test]
    fn test_is_lll_reduced_surface() {
        assert!(is_lll_reduced(&[vec![1, 0], vec![0, 1]], 0.99).unwrap());
        assert!(!is_lll_reduced(&[vec![1, 0], vec![100, 1]], 0.99).unwrap());
    }

    #[test]
    fn test_bkz_surface_validates_beta() {
        let basis = vec![vec![1, 0], vec![0, 1]];
        assert!(bkz_reduce(basis, MAX_ENUM_N + 1, 1, &ReduceParams::default()).is_err());
    }
}
