//! Built-in data sources.
//!
//! - `synthetic`: a reproducible reference curve and noisy synthetic galaxies

pub mod synthetic;
