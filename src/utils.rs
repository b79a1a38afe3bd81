//! Basis generators for tests and benchmarks

use crate::core::error::Result;
use crate::core::matrix::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => {
            let mut entropy = rand::rng();
            <StdRng as SeedableRng>::from_rng(&mut entropy)
        }
    }
}

/// Random full-rank basis: unit lower-triangular noise times a random
/// nonzero diagonal, so the determinant is a product of the diagonal and
/// never vanishes.
pub fn random_basis(n: usize, bound: i64, seed: Option<u64>) -> Result<Matrix> {
    let mut rng = make_rng(seed);
    let mut data = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..i {
            data[i][j] = rng.random_range(-bound..=bound);
        }
        let mut d = rng.random_range(1..=bound.max(1));
        if rng.random_bool(0.5) {
            d = -d;
        }
        data[i][i] = d;
    }
    Matrix::new(data)
}

/// Random q-ary lattice basis: `k` rows of `q * e_i` followed by rows
/// `(h_i, e_{i-k})` with `h_i` uniform mod q. These lattices have short
/// vectors far below the trivial `q`, which is what block reduction is
/// supposed to dig out.
pub fn qary_basis(n: usize, k: usize, q: i64, seed: Option<u64>) -> Result<Matrix> {
    let mut rng = make_rng(seed);
    let mut data = vec![vec![0i64; n]; n];
    for i in 0..k.min(n) {
        data[i][i] = q;
    }
    for i in k..n {
        for j in 0..k {
            data[i][j] = rng.random_range(0..q);
        }
        data[i][i] = 1;
    }
    Matrix::new(data)
}

/// Standard subset-sum embedding: one row `(e_i, w_i)` per weight plus the
/// closing row `(0, ..., 0, -target)`. A subset summing to `target` shows
/// up as a lattice vector whose last coordinate is zero and whose norm is
/// the subset size.
pub fn knapsack_basis(weights: &[i64], target: i64) -> Result<Matrix> {
    let n = weights.len();
    let mut data = vec![vec![0i64; n + 1]; n + 1];
    for (i, &w) in weights.iter().enumerate() {
        data[i][i] = 1;
        data[i][n] = w;
    }
    data[n][n] = -target;
    Matrix::new(data)
}
