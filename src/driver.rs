//! Segmented parallel reduction driver
//!
//! One pass: refactorize, split the basis into disjoint windows of the
//! R-factor, run the selected in-block kernel on every window in parallel,
//! compose the resulting transforms into the global basis and transform
//! sequentially in block order, then run a global size-reduction pass across
//! the block boundaries. The grid offset toggles between 0 and w/2 each
//! pass so that row pairs straddling a boundary fall inside a block on the
//! next pass. Convergence is declared after two consecutive passes (one per
//! offset) in which no window produced a non-identity transform and the
//! global size reduction was a no-op, or when the Gram-Schmidt profile
//! stops moving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bkz::bkz_block;
use crate::core::error::{ReduceError, Result};
use crate::core::matrix::{BlockTransform, IntScalar, Matrix};
use crate::lll::lll_block;
use crate::metrics::{potential, Metrics, TimeProfile};
use crate::pruning::MAX_ENUM_N;
use crate::qr::qr_factor;
use crate::size_reduce::{seysen_reduce, size_reduce};

/// Environment override for the worker count; the `cores` option wins.
const CORES_ENV: &str = "LATTICE_REDUCER_CORES";

/// Relative tolerance under which two Gram-Schmidt profiles count as equal.
const PROFILE_TOL: f64 = 1e-9;

/// Which in-block kernel the driver dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Classical LLL
    Lll,
    /// LLL with deep insertions up to `depth` positions back
    DeepLll { depth: usize },
    /// Block Korkine-Zolotarev with pruned enumeration
    Bkz { beta: usize, tours: usize },
}

/// Configuration for one reduction call. No hidden globals: thread count,
/// verbosity, and the debug knobs all live here.
#[derive(Debug, Clone)]
pub struct ReduceParams {
    pub algorithm: Algorithm,
    /// Lovász parameter, in (1/4, 1]
    pub delta: f64,
    /// Working block width; `None` picks ~sqrt(n) clamped to [8, 128]
    pub block_size: Option<usize>,
    /// Worker threads; `None` falls back to LATTICE_REDUCER_CORES, then to
    /// the rayon default
    pub cores: Option<usize>,
    /// Use Seysen's batched size reduction for the global pass
    pub use_seysen: bool,
    /// Emit per-pass progress through `log`
    pub verbose: bool,
    /// Hard cap on driver passes
    pub max_passes: usize,
    /// Soft wall-clock limit, checked between passes
    pub timeout: Option<Duration>,
    /// Cooperative cancellation flag, checked between passes
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ReduceParams {
    fn default() -> Self {
        ReduceParams {
            algorithm: Algorithm::Lll,
            delta: 0.99,
            block_size: None,
            cores: None,
            use_seysen: false,
            verbose: false,
            max_passes: 1000,
            timeout: None,
            cancel: None,
        }
    }
}

impl ReduceParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.delta > 0.25 && self.delta <= 1.0) {
            return Err(ReduceError::invalid_input(format!(
                "delta must lie in (0.25, 1.0], got {}",
                self.delta
            )));
        }
        if let Some(w) = self.block_size {
            if w < 2 {
                return Err(ReduceError::invalid_input(format!(
                    "block size must be at least 2, got {}",
                    w
                )));
            }
        }
        match self.algorithm {
            Algorithm::Lll => {}
            Algorithm::DeepLll { depth } => {
                if depth < 1 {
                    return Err(ReduceError::invalid_input(
                        "deep-LLL insertion depth must be at least 1",
                    ));
                }
            }
            Algorithm::Bkz { beta, tours } => {
                if beta < 2 {
                    return Err(ReduceError::invalid_input(format!(
                        "BKZ block size must be at least 2, got {}",
                        beta
                    )));
                }
                if beta > MAX_ENUM_N {
                    return Err(ReduceError::invalid_input(format!(
                        "BKZ block size {} exceeds the enumeration maximum {}",
                        beta, MAX_ENUM_N
                    )));
                }
                if tours == 0 {
                    return Err(ReduceError::invalid_input("BKZ needs at least one tour"));
                }
            }
        }
        Ok(())
    }
}

/// How a reduction call ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReductionStatus {
    /// The basis stabilized
    Converged,
    /// Soft timeout hit; the returned basis is the best so far
    TimedOut,
    /// The cancellation flag was raised
    Cancelled,
    /// `max_passes` exhausted before the basis stabilized
    PassLimit,
}

/// Result of a reduction: the reduced basis (rows are lattice vectors), the
/// unimodular transform with `transform * input = basis` exactly, and the
/// metrics of the final profile.
#[derive(Debug, Clone)]
pub struct Reduction<Z: IntScalar = i64> {
    pub basis: Matrix<Z>,
    pub transform: Matrix<Z>,
    pub metrics: Metrics,
    pub status: ReductionStatus,
}

#[derive(Clone, Copy)]
enum BlockKernel {
    Lll { delta: f64, depth: usize },
    Bkz { delta: f64, beta: usize },
}

impl BlockKernel {
    fn run(self, rw: &mut crate::qr::RMatrix, uw: &mut BlockTransform) -> Result<bool> {
        let w = rw.size();
        match self {
            BlockKernel::Lll { delta, depth } => Ok(lll_block(rw, uw, 0, w, delta, depth)),
            BlockKernel::Bkz { delta, beta } => bkz_block(rw, uw, delta, beta),
        }
    }
}

/// The segmented reduction engine.
pub struct Reducer {
    params: ReduceParams,
}

impl Reducer {
    pub fn new() -> Self {
        Self::with_params(ReduceParams::default())
    }

    pub fn with_params(params: ReduceParams) -> Self {
        Reducer { params }
    }

    /// Reduce a row-basis. Works for any scalar behind [`IntScalar`]; with
    /// `i64` an overflow during composition aborts with
    /// [`ReduceError::Overflow`] and the caller should retry in arbitrary
    /// precision.
    pub fn reduce<Z: IntScalar>(&self, basis: &Matrix<Z>) -> Result<Reduction<Z>> {
        self.params.validate()?;
        if !basis.is_square() {
            return Err(ReduceError::invalid_input(format!(
                "basis must be square, got {}x{}",
                basis.rows(),
                basis.cols()
            )));
        }

        let n = basis.rows();
        let w = resolve_block_size(n, self.params.block_size);
        if let Algorithm::Bkz { beta, .. } = self.params.algorithm {
            if beta > w {
                return Err(ReduceError::invalid_input(format!(
                    "BKZ block size {} exceeds the working block width {}",
                    beta, w
                )));
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(resolve_cores(self.params.cores))
            .build()
            .map_err(|e| ReduceError::invalid_input(format!("thread pool: {}", e)))?;

        let start = Instant::now();
        let mut time = TimeProfile::default();

        // column convention internally: every transform becomes a
        // right-multiply of a column strip
        let mut bcols = basis.transpose();
        let mut u: Matrix<Z> = Matrix::identity(n);

        let mut offset_zero = true;
        let mut quiet_passes = 0usize;
        let mut stable_passes = 0usize;
        let mut tours_done = 0usize;
        let mut last_profile: Option<Vec<f64>> = None;
        let mut status = ReductionStatus::PassLimit;

        for pass in 0..self.params.max_passes {
            if let Some(flag) = &self.params.cancel {
                if flag.load(Ordering::Relaxed) {
                    status = ReductionStatus::Cancelled;
                    break;
                }
            }
            if let Some(limit) = self.params.timeout {
                if start.elapsed() >= limit {
                    status = ReductionStatus::TimedOut;
                    break;
                }
            }

            let t = Instant::now();
            let r = qr_factor(&bcols)?;
            time.qr += t.elapsed();

            let diag = r.diag();
            if profiles_match(last_profile.as_deref(), &diag) {
                stable_passes += 1;
            } else {
                stable_passes = 0;
            }
            last_profile = Some(diag);

            let (kernel, bkz_pass) = self.pick_kernel(offset_zero, tours_done);
            let grid = block_grid(n, w, if offset_zero { 0 } else { w / 2 });

            let t = Instant::now();
            let outcomes: Result<Vec<(usize, usize, BlockTransform)>> = pool.install(|| {
                grid.par_iter()
                    .map(|&(lo, hi)| {
                        let mut rw = r.window(lo, hi);
                        let mut uw = BlockTransform::identity(hi - lo);
                        kernel.run(&mut rw, &mut uw)?;
                        Ok((lo, hi, uw))
                    })
                    .collect()
            });
            let outcomes = outcomes?;
            time.kernels += t.elapsed();
            time.kernel_invocations += grid.len() as u64;

            // sequential composition in block index order keeps the pass
            // sequentially consistent regardless of the parallel schedule
            let t = Instant::now();
            let mut active_blocks = 0usize;
            for (lo, hi, uw) in &outcomes {
                if !uw.is_identity() {
                    active_blocks += 1;
                    bcols.right_mul_strip(*lo, *hi, uw)?;
                    u.right_mul_strip(*lo, *hi, uw)?;
                }
            }
            time.compose += t.elapsed();

            // inter-block size reduction on a fresh factorization
            let t = Instant::now();
            let mut r2 = qr_factor(&bcols)?;
            time.qr += t.elapsed();

            let t = Instant::now();
            let mut u_global = BlockTransform::identity(n);
            let sr_changed = if self.params.use_seysen {
                seysen_reduce(&mut r2, &mut u_global, 0, n)
            } else {
                size_reduce(&mut r2, &mut u_global, 0, n)
            };
            if sr_changed {
                bcols.right_mul_strip(0, n, &u_global)?;
                u.right_mul_strip(0, n, &u_global)?;
            }
            time.compose += t.elapsed();

            if bkz_pass {
                tours_done += 1;
            }
            time.passes = pass + 1;

            if self.params.verbose {
                log::info!(
                    "pass {}: offset {}, {}/{} active blocks, potential {:.4}",
                    pass,
                    if offset_zero { 0 } else { w / 2 },
                    active_blocks,
                    grid.len(),
                    potential(&r2)
                );
            }

            if active_blocks == 0 && !sr_changed {
                quiet_passes += 1;
            } else {
                quiet_passes = 0;
            }
            let tours_pending = matches!(self.params.algorithm, Algorithm::Bkz { tours, .. } if tours_done < tours);
            if (quiet_passes >= 2 || stable_passes >= 2) && !tours_pending {
                status = ReductionStatus::Converged;
                break;
            }

            if n > w {
                offset_zero = !offset_zero;
            }
        }

        if status == ReductionStatus::PassLimit {
            log::warn!(
                "reduction did not stabilize within {} passes",
                self.params.max_passes
            );
        }

        let t = Instant::now();
        let final_r = qr_factor(&bcols)?;
        time.qr += t.elapsed();
        time.total = start.elapsed();

        Ok(Reduction {
            basis: bcols.transpose(),
            transform: u.transpose(),
            metrics: Metrics::from_r(&final_r, time),
            status,
        })
    }

    /// Kernel selection happens once per pass, far away from the inner
    /// arithmetic. BKZ only runs on the aligned grid; the staggered grid
    /// gets plain LLL so enumeration never sees a misaligned block.
    fn pick_kernel(&self, offset_zero: bool, tours_done: usize) -> (BlockKernel, bool) {
        let delta = self.params.delta;
        match self.params.algorithm {
            Algorithm::Lll => (BlockKernel::Lll { delta, depth: 1 }, false),
            Algorithm::DeepLll { depth } => (BlockKernel::Lll { delta, depth }, false),
            Algorithm::Bkz { beta, tours } => {
                if offset_zero && tours_done < tours {
                    (BlockKernel::Bkz { delta, beta }, true)
                } else {
                    (BlockKernel::Lll { delta, depth: 1 }, false)
                }
            }
        }
    }
}

impl Default for Reducer {
    fn default() -> Self {
        Reducer::new()
    }
}

fn resolve_block_size(n: usize, requested: Option<usize>) -> usize {
    requested.unwrap_or_else(|| ((n as f64).sqrt().round() as usize).clamp(8, 128))
}

fn resolve_cores(requested: Option<usize>) -> usize {
    // 0 lets rayon pick its default
    requested.unwrap_or_else(|| {
        std::env::var(CORES_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    })
}

/// Disjoint contiguous windows of width <= w covering [0, n), staggered by
/// `offset`.
fn block_grid(n: usize, w: usize, offset: usize) -> Vec<(usize, usize)> {
    let mut blocks = Vec::new();
    let mut start = 0;
    if offset > 0 && offset < n {
        blocks.push((0, offset));
        start = offset;
    }
    while start < n {
        let end = (start + w).min(n);
        blocks.push((start, end));
        start = end;
    }
    blocks
}

fn profiles_match(prev: Option<&[f64]>, cur: &[f64]) -> bool {
    match prev {
        None => false,
        Some(prev) => prev
            .iter()
            .zip(cur.iter())
            .all(|(a, b)| (a - b).abs() <= PROFILE_TOL * a.abs().max(b.abs())),
    }
}
