//! Input/output helpers.
//!
//! - tab-delimited table ingest (`ingest`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
