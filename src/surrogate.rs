//! Posterior-query interface to the surrogate model, plus a fixed-hyperparameter
//! Gaussian-process implementation of it.
//!
//! The acquisition engine never mutates the surrogate and never optimizes its
//! hyperparameters: it only queries the predictive distribution and its
//! derivatives with respect to the query points. [`GpPosterior`] conditions a
//! squared-exponential GP on training data with hyperparameters supplied by the
//! caller, which is enough to exercise the whole engine end to end.
use crate::errors::{AcqError, Result};
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2};

/// Differentiable posterior query capability expected from a surrogate model.
///
/// All methods take a (n, d) batch of points. Implementations must be pure:
/// repeated queries at the same points return the same distribution.
pub trait PosteriorSurrogate: Sync {
    /// Input dimensionality d accepted by the model
    fn dim(&self) -> usize;

    /// Pointwise predictive means and variances at the n given points
    fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)>;

    /// Joint predictive mean vector and covariance matrix across the n given
    /// points, suitable for correlated sampling over a q-batch
    fn predict_joint(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)>;

    /// Derivatives of predictive mean and variance with respect to the input
    /// coordinates, both returned as (n, d) matrices
    fn predict_valvar_gradients(&self, x: &ArrayView2<f64>) -> Result<(Array2<f64>, Array2<f64>)>;
}

/// Parameters of a [`GpPosterior`], built through `GpPosterior::params()`
pub struct GpPosteriorParams {
    theta: Option<Array1<f64>>,
    sigma2: f64,
    nugget: f64,
}

impl GpPosteriorParams {
    /// Sets the correlation lengthscales, one per input dimension
    pub fn theta(mut self, theta: Array1<f64>) -> Self {
        self.theta = Some(theta);
        self
    }

    /// Sets the process variance
    pub fn sigma2(mut self, sigma2: f64) -> Self {
        self.sigma2 = sigma2;
        self
    }

    /// Sets the diagonal nugget added to the training covariance for conditioning
    pub fn nugget(mut self, nugget: f64) -> Self {
        self.nugget = nugget;
        self
    }

    /// Condition the process on the given training data (xt, yt).
    ///
    /// No hyperparameter optimization happens here: theta, sigma2 and nugget
    /// are taken as given and only the posterior factorization is computed.
    pub fn fit(
        self,
        xt: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        yt: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<GpPosterior> {
        let (n, d) = xt.dim();
        if n == 0 || d == 0 {
            return Err(AcqError::InvalidConfigError(
                "training set must be non empty".to_string(),
            ));
        }
        if yt.len() != n {
            return Err(AcqError::InvalidConfigError(format!(
                "training outputs length {} does not match {} training points",
                yt.len(),
                n
            )));
        }
        let theta = self.theta.unwrap_or_else(|| Array1::ones(d));
        if theta.len() != d || theta.iter().any(|&t| t <= 0.) {
            return Err(AcqError::InvalidConfigError(format!(
                "theta must hold {d} positive lengthscales, got {theta}"
            )));
        }
        if self.sigma2 <= 0. || self.nugget < 0. {
            return Err(AcqError::InvalidConfigError(format!(
                "sigma2 must be positive and nugget non negative, got sigma2={} nugget={}",
                self.sigma2, self.nugget
            )));
        }

        let ybar = yt.mean().unwrap_or(0.);
        let mut k = Array2::from_shape_fn((n, n), |(i, j)| {
            se_corr(&xt.row(i), &xt.row(j), &theta) * self.sigma2
        });
        for i in 0..n {
            k[[i, i]] += self.nugget;
        }
        let r_chol = k.cholesky()?;
        let resid = (yt - ybar).insert_axis(Axis(1));
        let t = r_chol.solve_triangular(&resid, UPLO::Lower)?;
        let alpha = r_chol.t().solve_triangular(&t, UPLO::Upper)?;

        Ok(GpPosterior {
            xt: xt.to_owned(),
            theta,
            sigma2: self.sigma2,
            nugget: self.nugget,
            ybar,
            r_chol,
            alpha,
        })
    }
}

/// A Gaussian-process posterior with squared-exponential correlation and fixed
/// hyperparameters, conditioned once on training data and read-only afterwards
pub struct GpPosterior {
    xt: Array2<f64>,
    theta: Array1<f64>,
    sigma2: f64,
    nugget: f64,
    ybar: f64,
    /// Cholesky factor of the training covariance matrix
    r_chol: Array2<f64>,
    /// Covariance solve against centered training outputs, kept as (n, 1)
    alpha: Array2<f64>,
}

impl GpPosterior {
    /// Parameters constructor with default hyperparameters
    /// (unit lengthscales, unit process variance, 1e-8 nugget)
    pub fn params() -> GpPosteriorParams {
        GpPosteriorParams {
            theta: None,
            sigma2: 1.0,
            nugget: 1e-8,
        }
    }

    /// Cross covariance matrix (n_train, m) between training points and x
    fn cross_cov(&self, x: &ArrayView2<f64>) -> Array2<f64> {
        Array2::from_shape_fn((self.xt.nrows(), x.nrows()), |(i, j)| {
            se_corr(&self.xt.row(i), &x.row(j), &self.theta) * self.sigma2
        })
    }

    fn check_dim(&self, x: &ArrayView2<f64>) -> Result<()> {
        if x.ncols() != self.dim() {
            return Err(AcqError::InvalidValueError(format!(
                "query points have {} components, model expects {}",
                x.ncols(),
                self.dim()
            )));
        }
        Ok(())
    }
}

impl PosteriorSurrogate for GpPosterior {
    fn dim(&self) -> usize {
        self.xt.ncols()
    }

    fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        self.check_dim(x)?;
        let kx = self.cross_cov(x);
        let mean = kx.t().dot(&self.alpha).remove_axis(Axis(1)) + self.ybar;
        let v = self.r_chol.solve_triangular(&kx, UPLO::Lower)?;
        // Variance might go slightly negative depending on machine precision
        let var = v
            .mapv(|u| u * u)
            .sum_axis(Axis(0))
            .mapv(|s| (self.sigma2 + self.nugget - s).max(0.));
        Ok((mean, var))
    }

    fn predict_joint(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        self.check_dim(x)?;
        let q = x.nrows();
        let kx = self.cross_cov(x);
        let mean = kx.t().dot(&self.alpha).remove_axis(Axis(1)) + self.ybar;
        let mut kqq = Array2::from_shape_fn((q, q), |(i, j)| {
            se_corr(&x.row(i), &x.row(j), &self.theta) * self.sigma2
        });
        for i in 0..q {
            kqq[[i, i]] += self.nugget;
        }
        let v = self.r_chol.solve_triangular(&kx, UPLO::Lower)?;
        let cov = kqq - v.t().dot(&v);
        // Enforce symmetry lost to rounding
        let cov = (&cov + &cov.t()) * 0.5;
        Ok((mean, cov))
    }

    fn predict_valvar_gradients(&self, x: &ArrayView2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        self.check_dim(x)?;
        let (m, d) = x.dim();
        let kx = self.cross_cov(x);
        let v = self.r_chol.solve_triangular(&kx, UPLO::Lower)?;
        let w = self.r_chol.t().solve_triangular(&v, UPLO::Upper)?;

        let mut dmean = Array2::zeros((m, d));
        let mut dvar = Array2::zeros((m, d));
        for j in 0..m {
            let xj = x.row(j);
            for (i, xi) in self.xt.outer_iter().enumerate() {
                for l in 0..d {
                    // d k(x, xi) / dx_l
                    let dk = kx[[i, j]] * (xi[l] - xj[l]) / (self.theta[l] * self.theta[l]);
                    dmean[[j, l]] += self.alpha[[i, 0]] * dk;
                    dvar[[j, l]] -= 2. * w[[i, j]] * dk;
                }
            }
        }
        Ok((dmean, dvar))
    }
}

/// Squared-exponential correlation between two points given lengthscales theta
fn se_corr(
    a: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    b: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    theta: &Array1<f64>,
) -> f64 {
    let mut s = 0.;
    for i in 0..a.len() {
        let r = (a[i] - b[i]) / theta[i];
        s += r * r;
    }
    (-0.5 * s).exp()
}
