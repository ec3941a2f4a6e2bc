//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - minimize the σ-weighted residuals with Levenberg–Marquardt (`lm`)
//! - generate multi-start initial guesses (`start_grid`)
//! - drive a galaxy fit and hold its result (`fitter`)

pub mod fitter;
pub mod lm;
pub mod start_grid;

pub use fitter::*;
pub use lm::*;
pub use start_grid::*;
