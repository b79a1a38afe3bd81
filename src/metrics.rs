//! Reduction quality metrics computed from the final R-factor

use crate::qr::RMatrix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quality and cost figures for one reduction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Root Hermite factor of the reduced basis (lower is better)
    pub rhf: f64,
    /// Least-squares slope of the log Gram-Schmidt profile
    pub slope: f64,
    /// Lattice potential: sum of (n - i) * ln R[i][i]
    pub potential: f64,
    /// Euclidean norm of the first basis vector
    pub first_norm: f64,
    /// Log Gram-Schmidt profile, ln R[i][i] per position
    pub profile: Vec<f64>,
    /// Where the time went
    pub time: TimeProfile,
}

/// Wall-clock breakdown of a reduction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeProfile {
    pub total: Duration,
    pub qr: Duration,
    pub kernels: Duration,
    pub compose: Duration,
    /// Driver passes executed
    pub passes: usize,
    /// In-block kernel invocations across all passes
    pub kernel_invocations: u64,
}

/// Log Gram-Schmidt profile `ln R[i][i]`.
pub fn log_profile(r: &RMatrix) -> Vec<f64> {
    r.diag().iter().map(|d| d.ln()).collect()
}

/// Root Hermite factor `(|b_0| / |det B|^{1/n})^{1/n}`, evaluated in log
/// space so large determinants cannot overflow.
pub fn root_hermite_factor(r: &RMatrix) -> f64 {
    let lp = log_profile(r);
    let n = lp.len() as f64;
    let log_det: f64 = lp.iter().sum();
    ((lp[0] - log_det / n) / n).exp()
}

/// Slope of the least-squares line through `(i, ln R[i][i])`. A reduced
/// basis has a gently decreasing profile; steeper is worse.
pub fn slope(r: &RMatrix) -> f64 {
    let lp = log_profile(r);
    let n = lp.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean: f64 = lp.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in lp.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    num / den
}

/// Lattice potential `sum (n - i) * ln R[i][i]`; strictly decreases with
/// every swap or insertion, which is what makes the driver terminate.
pub fn potential(r: &RMatrix) -> f64 {
    let lp = log_profile(r);
    let n = lp.len();
    lp.iter()
        .enumerate()
        .map(|(i, &y)| (n - i) as f64 * y)
        .sum()
}

impl Metrics {
    pub(crate) fn from_r(r: &RMatrix, time: TimeProfile) -> Self {
        Metrics {
            rhf: root_hermite_factor(r),
            slope: slope(r),
            potential: potential(r),
            first_norm: r.at(0, 0),
            profile: log_profile(r),
            time,
        }
    }
}
