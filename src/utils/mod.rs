//! Numerical helpers shared by acquisition criteria and optimizers.
mod find_best;
mod stats;

pub use find_best::*;
pub use stats::*;
