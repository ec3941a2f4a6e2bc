//! LCM model components.
//!
//! - `kernel`: interchangeable formulations of the dimensionless kernel
//! - `reference`: the shared reference rotation curve and its interpolants
//! - `model`: the evaluator combining both for a target galaxy

pub mod kernel;
pub mod model;
pub mod reference;

pub use kernel::*;
pub use model::*;
pub use reference::*;
