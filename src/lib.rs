//! `neros-lcm` library crate.
//!
//! Fits galaxy rotation curves with the luminous convolution model (LCM):
//! a galaxy's observed velocity is its luminous velocity plus a contribution
//! derived from comparing its potential to a reference (Milky Way) curve.
//!
//! The binary (`neros`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the reference model and fit driver are reusable from other tools

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
