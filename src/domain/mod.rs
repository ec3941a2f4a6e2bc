//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model configuration (`ModelConfig`, `KernelKind`)
//! - validated inputs (`Curve`, `FitInput`)
//! - fit outputs (`FitResult`, `FitReport`, `GalaxyFitRecord`)

pub mod types;

pub use types::*;
