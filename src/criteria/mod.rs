//! Acquisition criteria: scalar utilities estimating the value of evaluating
//! the true objective at a candidate, together with their gradients.
//!
//! A criterion scores a q-batch candidate given as a flattened (q, d) slice.
//! Implementations are interchangeable at the call site of
//! [`crate::optimize_acquisition`]; deterministic criteria additionally work
//! with the gradient-based bounded optimizer.
mod ei;
mod qei;

pub use ei::*;
pub use qei::*;

use crate::surrogate::PosteriorSurrogate;
use ndarray::Array1;

/// An acquisition criterion to be maximized over the input domain
pub trait AcqCriterion: Sync {
    /// Criterion name
    fn name(&self) -> &'static str;

    /// Number of points q per candidate batch
    fn q(&self) -> usize;

    /// Whether two evaluations at the same candidate return the same value.
    /// False for Monte Carlo criteria drawing fresh samples per call.
    fn is_deterministic(&self) -> bool {
        true
    }

    /// Compute the criterion at candidate `x` (flattened (q, d) slice) using
    /// the surrogate posterior and the best observed objective value
    fn value(&self, x: &[f64], model: &dyn PosteriorSurrogate, best_f: f64) -> f64;

    /// Compute the criterion derivatives with respect to the q * d candidate
    /// coordinates
    fn grad(&self, x: &[f64], model: &dyn PosteriorSurrogate, best_f: f64) -> Array1<f64>;
}
