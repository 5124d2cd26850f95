use crate::errors::{AcqError, Result};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use serde::{Deserialize, Serialize};

/// A trait for functions used by internal optimizers
/// Functions are expected to be defined as `f(x, g, u)` where
/// * `x` is the input information,
/// * `g` an optional gradient information to be updated if present
/// * `u` information provided by the user
pub trait ObjFn<U>: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}
impl<T, U> ObjFn<U> for T where T: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}

/// Data carried through acquisition objective evaluations during optimization
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcqObjData {
    /// Best objective value observed so far in the training data
    pub best_f: f64,
    /// Scaling of the acquisition objective (value which once scaled is equal to one)
    pub scale_acq: f64,
}

impl Default for AcqObjData {
    fn default() -> Self {
        AcqObjData {
            best_f: f64::MIN,
            scale_acq: 1.0,
        }
    }
}

/// Optimizer used to maximize the acquisition criterion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcqOptimizer {
    /// SLSQP optimizer (gradient based bounded local search with convergence test).
    /// Only valid with a deterministic acquisition criterion.
    Slsqp,
    /// Gradient ascent with adaptive per-coordinate step sizes (first and second
    /// gradient moment estimates), run for a fixed iteration budget.
    Adam,
    /// Plain gradient ascent with a fixed step size, run for a fixed iteration budget.
    Sga,
}

/// Acquisition optimization result
#[derive(Clone, Debug)]
pub struct OptimResult {
    /// Optimum candidate as a (q, d) matrix of q points
    pub x_opt: Array2<f64>,
    /// Acquisition value at the optimum candidate
    pub value: f64,
}

/// Box constraints of the input domain.
///
/// The domain is the product of the `[lower[i], upper[i]]` intervals with
/// `lower[i] < upper[i]` enforced at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bounds {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl Bounds {
    /// Constructor given lower and upper bound vectors
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(AcqError::InvalidConfigError(format!(
                "bounds dimensions mismatch: lower={} upper={}",
                lower.len(),
                upper.len()
            )));
        }
        if lower
            .iter()
            .zip(upper.iter())
            .any(|(&lo, &up)| !(lo < up) || !lo.is_finite() || !up.is_finite())
        {
            return Err(AcqError::InvalidConfigError(format!(
                "bounds must satisfy lower < upper componentwise, got lower={lower} upper={upper}"
            )));
        }
        Ok(Bounds { lower, upper })
    }

    /// Constructor given a design space as a (d, 2) matrix \[\[lower bound, upper bound\], ...\]
    pub fn from_xlimits(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Self> {
        if xlimits.ncols() != 2 {
            return Err(AcqError::InvalidConfigError(format!(
                "xlimits must have 2 columns (lower, upper), got {}",
                xlimits.ncols()
            )));
        }
        Self::new(xlimits.column(0).to_owned(), xlimits.column(1).to_owned())
    }

    /// Input dimensionality d
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower bounds vector
    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    /// Upper bounds vector
    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Interval widths, `upper - lower`
    pub fn width(&self) -> Array1<f64> {
        &self.upper - &self.lower
    }

    /// Check a flattened batch of points (length multiple of d) lies within the domain
    pub fn contains(&self, x: &[f64]) -> bool {
        let d = self.dim();
        x.iter()
            .enumerate()
            .all(|(i, &v)| v >= self.lower[i % d] && v <= self.upper[i % d])
    }

    /// Project a flattened batch of points (length multiple of d) onto the domain
    pub fn clamp(&self, x: &mut [f64]) {
        let d = self.dim();
        for (i, v) in x.iter_mut().enumerate() {
            *v = v.clamp(self.lower[i % d], self.upper[i % d]);
        }
    }

    /// Bounds as (lower, upper) pairs repeated for each of the q points of a candidate,
    /// matching the layout of a flattened (q, d) candidate
    pub fn flat_pairs(&self, q: usize) -> Vec<(f64, f64)> {
        let mut pairs = Vec::with_capacity(q * self.dim());
        for _ in 0..q {
            pairs.extend(self.lower.iter().zip(self.upper.iter()).map(|(&l, &u)| (l, u)));
        }
        pairs
    }
}
