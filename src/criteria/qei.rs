use crate::criteria::AcqCriterion;
use crate::sampler::NormalQmcSampler;
use crate::surrogate::PosteriorSurrogate;
use finitediff::FiniteDiff;
use linfa_linalg::cholesky::*;
use ndarray::{Array1, Array2, ArrayView, Axis};

/// Largest diagonal jitter tried when the posterior covariance is not
/// numerically positive definite (duplicated candidate points typically)
const MAX_COV_JITTER: f64 = 1e-4;

/// Monte Carlo q-Expected-Improvement.
///
/// Joint posterior samples at the q candidate points are reparameterized as
/// `mean + L z` where `L` is the Cholesky factor of the posterior covariance
/// and `z` the sampler's base normal draws, so the estimator stays a smooth
/// function of the candidate coordinates for a fixed draw set. The per-draw
/// improvement is the best improvement over `best_f` across the q points; qEI
/// is the average over draws.
///
/// With the sampler in fixed mode the criterion is deterministic and converges
/// to [`crate::criteria::ExpectedImprovement`] for q = 1 as the sample count
/// grows. In resampling mode the criterion is a stochastic function of the
/// candidate and only the fixed-budget gradient optimizers apply.
pub struct QExpectedImprovement {
    q: usize,
    sampler: NormalQmcSampler,
}

impl QExpectedImprovement {
    /// Constructor given the batch size q, the Monte Carlo sample count and a seed
    pub fn new(q: usize, n_samples: usize, seed: u64) -> Self {
        QExpectedImprovement {
            q,
            sampler: NormalQmcSampler::new_with_seed(n_samples, q, seed),
        }
    }

    /// Sets the resampling mode of the underlying sampler: when true, fresh
    /// draws are used at every evaluation and the criterion becomes stochastic
    pub fn resampling(mut self, resample: bool) -> Self {
        self.sampler = self.sampler.resampling(resample);
        self
    }

    /// The underlying normal sampler
    pub fn sampler(&self) -> &NormalQmcSampler {
        &self.sampler
    }

    /// qEI estimate at candidate `x` for a given base draw set `z` (n_samples, q)
    fn value_with_draws(
        &self,
        x: &[f64],
        model: &dyn PosteriorSurrogate,
        best_f: f64,
        z: &Array2<f64>,
    ) -> f64 {
        let d = x.len() / self.q;
        let pt = ArrayView::from_shape((self.q, d), x).unwrap();
        let (mean, cov) = match model.predict_joint(&pt) {
            Ok(post) => post,
            _ => return 0.0,
        };
        let l = match cholesky_with_jitter(&cov) {
            Some(l) => l,
            None => return 0.0,
        };
        // One joint posterior sample per draw: rows of z L^T + mean
        let samples = z.dot(&l.t()) + &mean;
        let improvements = samples.map_axis(Axis(1), |s| {
            let best = s.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            (best - best_f).max(0.)
        });
        improvements.mean().unwrap_or(0.)
    }
}

impl AcqCriterion for QExpectedImprovement {
    fn name(&self) -> &'static str {
        "qEI"
    }

    fn q(&self) -> usize {
        self.q
    }

    fn is_deterministic(&self) -> bool {
        !self.sampler.is_resampling()
    }

    fn value(&self, x: &[f64], model: &dyn PosteriorSurrogate, best_f: f64) -> f64 {
        let z = self.sampler.draws();
        self.value_with_draws(x, model, best_f, &z)
    }

    /// Central finite differences with the base draw frozen for the whole
    /// gradient evaluation, so that even in resampling mode one gradient is
    /// internally consistent (fresh draws still make successive calls differ)
    fn grad(&self, x: &[f64], model: &dyn PosteriorSurrogate, best_f: f64) -> Array1<f64> {
        let z = self.sampler.draws();
        let f = |v: &Vec<f64>| -> f64 { self.value_with_draws(v, model, best_f, &z) };
        Array1::from(x.to_vec().central_diff(&f))
    }
}

/// Lower Cholesky factor of `cov`, retrying with a growing diagonal jitter
/// when the plain factorization fails
fn cholesky_with_jitter(cov: &Array2<f64>) -> Option<Array2<f64>> {
    if let Ok(l) = cov.cholesky() {
        return Some(l);
    }
    let mut jitter = 1e-10;
    while jitter <= MAX_COV_JITTER {
        let mut shifted = cov.clone();
        for i in 0..shifted.nrows() {
            shifted[[i, i]] += jitter;
        }
        if let Ok(l) = shifted.cholesky() {
            log::debug!("posterior covariance factorized with jitter {jitter:e}");
            return Some(l);
        }
        jitter *= 10.;
    }
    log::warn!("posterior covariance not positive definite, candidate dropped");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::EI;
    use crate::surrogate::GpPosterior;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn toy_gp() -> GpPosterior {
        let xt = array![[0.0], [0.25], [0.5], [0.75], [1.0]];
        let yt = array![0.1, 0.6, 1.0, 0.4, -0.2];
        GpPosterior::params()
            .theta(array![0.2])
            .fit(&xt, &yt)
            .expect("GP conditioning")
    }

    #[test]
    fn test_qei_matches_analytic_ei_for_q1() {
        let gp = toy_gp();
        let qei = QExpectedImprovement::new(1, 512, 42);
        for &x in &[0.1, 0.35, 0.6, 0.85] {
            let mc = qei.value(&[x], &gp, 1.0);
            let exact = EI.value(&[x], &gp, 1.0);
            assert_abs_diff_eq!(mc, exact, epsilon = 5e-3);
        }
    }

    #[test]
    fn test_qei_non_negative() {
        let gp = toy_gp();
        let qei = QExpectedImprovement::new(2, 256, 0);
        for i in 0..10 {
            let a = i as f64 / 9.;
            let v = qei.value(&[a, 1. - a], &gp, 1.0);
            assert!(v >= 0., "qEI = {v}");
        }
    }

    #[test]
    fn test_fixed_mode_is_deterministic() {
        let gp = toy_gp();
        let qei = QExpectedImprovement::new(2, 128, 7);
        assert!(qei.is_deterministic());
        let x = [0.2, 0.7];
        assert_eq!(qei.value(&x, &gp, 1.0), qei.value(&x, &gp, 1.0));
    }

    #[test]
    fn test_resampling_mode_is_stochastic() {
        let gp = toy_gp();
        let qei = QExpectedImprovement::new(1, 64, 7).resampling(true);
        assert!(!qei.is_deterministic());
        let x = [0.4];
        let v1 = qei.value(&x, &gp, 1.0);
        let v2 = qei.value(&x, &gp, 1.0);
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_duplicated_point_batch_reduces_to_single_point() {
        // The joint covariance of a duplicated point is singular; the jitter
        // fallback must keep the estimate close to the q = 1 value
        let gp = toy_gp();
        let q1 = QExpectedImprovement::new(1, 256, 3);
        let q2 = QExpectedImprovement::new(2, 256, 3);
        let v1 = q1.value(&[0.4], &gp, 1.0);
        let v2 = q2.value(&[0.4, 0.4], &gp, 1.0);
        assert_abs_diff_eq!(v1, v2, epsilon = 1e-2);
    }

    #[test]
    fn test_qei_gradient_against_value_slope() {
        let gp = toy_gp();
        let qei = QExpectedImprovement::new(1, 256, 11);
        let x = vec![0.35];
        let g = qei.grad(&x, &gp, 1.0);
        let h = 1e-5;
        let slope =
            (qei.value(&[x[0] + h], &gp, 1.0) - qei.value(&[x[0] - h], &gp, 1.0)) / (2. * h);
        assert_abs_diff_eq!(g[0], slope, epsilon = 1e-4);
    }
}
