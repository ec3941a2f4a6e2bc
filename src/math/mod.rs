//! Numerical building blocks: potential integral, interpolants, least squares.

pub mod interp;
pub mod ols;
pub mod potential;

pub use interp::*;
pub use ols::*;
pub use potential::*;
