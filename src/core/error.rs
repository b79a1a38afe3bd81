//! Error types for the reduction engine

use thiserror::Error;

/// Errors reported by the reduction driver.
///
/// Kernels themselves are total; everything here originates in the driver
/// (input validation, QR factorization, transform composition). Timeouts and
/// cancellation are not errors: the driver returns the best basis so far
/// together with a status flag.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReduceError {
    /// Malformed call: non-square basis, out-of-range delta, oversized beta, ...
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The QR factorization could not produce a usable R-factor.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// Integer overflow in the fixed-width (i64) path. The caller should
    /// retry with an arbitrary-precision scalar.
    #[error("integer overflow: {0}")]
    Overflow(String),
}

impl ReduceError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ReduceError::InvalidInput(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        ReduceError::Numerical(msg.into())
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        ReduceError::Overflow(msg.into())
    }
}

/// Result type for reduction operations
pub type Result<T> = std::result::Result<T, ReduceError>;
