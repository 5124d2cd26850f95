use crate::criteria::AcqCriterion;
use crate::surrogate::PosteriorSurrogate;
use crate::utils::{norm_cdf, norm_pdf};
use ndarray::{Array1, ArrayView};

/// A structure for Expected Improvement implementation
#[derive(Clone, Debug, Default)]
pub struct ExpectedImprovement;

/// Expected Improvement acquisition criterion
pub const EI: ExpectedImprovement = ExpectedImprovement {};

impl AcqCriterion for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "EI"
    }

    fn q(&self) -> usize {
        1
    }

    /// Compute EI criterion at given `x` point using the surrogate posterior
    /// and the best observed value of the objective function.
    ///
    /// `EI(x) = (mu - best_f) * Phi(z) + sigma * phi(z)` with
    /// `z = (mu - best_f) / sigma`, which is non negative by construction and
    /// zero when the predictive standard deviation vanishes.
    fn value(&self, x: &[f64], model: &dyn PosteriorSurrogate, best_f: f64) -> f64 {
        let pt = ArrayView::from_shape((1, x.len()), x).unwrap();
        match model.predict_valvar(&pt) {
            Ok((mean, var)) => {
                if var[0] < f64::EPSILON {
                    0.0
                } else {
                    let sigma = var[0].sqrt();
                    let diff = mean[0] - best_f;
                    let z = diff / sigma;
                    diff * norm_cdf(z) + sigma * norm_pdf(z)
                }
            }
            _ => 0.0,
        }
    }

    /// Computes derivatives of the EI criterion wrt to x components at given
    /// `x` point. The terms in `dz` cancel analytically which leaves
    /// `Phi(z) * dmu + phi(z) * dsigma`.
    fn grad(&self, x: &[f64], model: &dyn PosteriorSurrogate, best_f: f64) -> Array1<f64> {
        let pt = ArrayView::from_shape((1, x.len()), x).unwrap();
        match model.predict_valvar(&pt) {
            Ok((mean, var)) => {
                if var[0] < f64::EPSILON {
                    Array1::zeros(x.len())
                } else {
                    let sigma = var[0].sqrt();
                    let z = (mean[0] - best_f) / sigma;
                    match model.predict_valvar_gradients(&pt) {
                        Ok((dmean, dvar)) => {
                            let dmean = dmean.row(0);
                            let dsigma = dvar.row(0).mapv(|v| v / (2. * sigma));
                            dmean.mapv(|v| v * norm_cdf(z)) + dsigma.mapv(|v| v * norm_pdf(z))
                        }
                        _ => Array1::zeros(x.len()),
                    }
                }
            }
            _ => Array1::zeros(x.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surrogate::GpPosterior;
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
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
    fn test_ei_non_negative() {
        let gp = toy_gp();
        for i in 0..50 {
            let x = i as f64 / 49.;
            let v = EI.value(&[x], &gp, 1.0);
            assert!(v >= 0., "EI({x}) = {v}");
        }
    }

    #[test]
    fn test_ei_zero_at_degenerate_variance() {
        // At a training point the posterior variance collapses to the nugget
        let xt = array![[0.0], [1.0]];
        let yt = array![0.0, 1.0];
        let gp = GpPosterior::params()
            .theta(array![0.3])
            .nugget(0.0)
            .fit(&xt, &yt)
            .expect("GP conditioning");
        // mean = 0 <= best_f = 1 and sigma = 0 there
        assert_eq!(EI.value(&[0.0], &gp, 1.0), 0.0);
    }

    #[test]
    fn test_ei_gradients() {
        let gp = toy_gp();
        let best_f = 1.0;
        for &x in &[0.1, 0.33, 0.62, 0.9] {
            let x = vec![x];
            let grad = EI.grad(&x, &gp, best_f);
            let f = |v: &Vec<f64>| -> f64 { EI.value(v, &gp, best_f) };
            let grad_central = x.central_diff(&f);
            assert_abs_diff_eq!(grad[0], grad_central[0], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ei_prefers_unexplored_high_mean_region() {
        let gp = toy_gp();
        // Near the best training point the improvement outlook beats the flat tail
        let near_peak = EI.value(&[0.55], &gp, 1.0);
        let tail = EI.value(&[0.99], &gp, 1.0);
        assert!(near_peak > tail);
    }
}
