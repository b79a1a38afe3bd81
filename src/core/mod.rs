//! Core module wiring: exact matrices, block transforms, and errors.

pub mod error;
pub mod matrix;

// Re-export the most commonly used items so downstream code can simply import
// `crate::core::*` without having to juggle individual submodules.
pub use error::*;
pub use matrix::*;
