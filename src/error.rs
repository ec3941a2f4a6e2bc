//! Crate-wide error type.
//!
//! Numerical code reports *what* went wrong (bad input, undefined
//! intermediate, optimizer failure); the CLI maps each family to an exit code.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NerosError {
    /// Malformed input: bad reference table, too few points, non-finite values.
    #[error("validation error: {0}")]
    Validation(String),

    /// A mathematically undefined intermediate (negative sqrt argument,
    /// potential at its singular boundary).
    #[error("numeric domain error: {0}")]
    NumericDomain(String),

    /// Too few usable points (after clipping) or no galaxies to fit.
    #[error("nothing to fit: {0}")]
    InsufficientData(String),

    /// Accessor called before a successful fit.
    #[error("no fit available: call fit() before requesting fit results")]
    NotFitted,

    /// Optimizer exhausted its budget or could not find a descent direction.
    #[error("fit did not converge: {0}")]
    Convergence(String),

    /// Pointwise operation given arrays of different lengths.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Interpolant queried outside its valid range.
    #[error("radius {value} is outside the interpolation domain [{min}, {max}]")]
    OutOfDomain { value: f64, min: f64, max: f64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, NerosError>;

impl NerosError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn numeric_domain(message: impl Into<String>) -> Self {
        Self::NumericDomain(message.into())
    }

    pub fn convergence(message: impl Into<String>) -> Self {
        Self::Convergence(message.into())
    }

    /// True when the error marks an infeasible parameter trial rather than a
    /// broken input.
    pub fn is_numeric_domain(&self) -> bool {
        matches!(self, Self::NumericDomain(_))
    }

    /// Process exit code used by the `neros` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_)
            | Self::DimensionMismatch { .. }
            | Self::OutOfDomain { .. }
            | Self::Io(_)
            | Self::Parse(_) => 2,
            Self::InsufficientData(_) => 3,
            Self::NumericDomain(_) | Self::Convergence(_) => 4,
            Self::NotFitted => 5,
        }
    }
}

/// Fail with `DimensionMismatch` unless `actual == expected`.
pub(crate) fn ensure_same_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(NerosError::DimensionMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}
