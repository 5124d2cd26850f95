//! Gradient-ascent refinement of the restart batch for a fixed iteration
//! budget, the required path when the acquisition criterion is stochastic.
//!
//! The whole restart batch is stepped jointly: at each iteration every live
//! restart takes one ascent step and is projected back onto the bounds. No
//! convergence test is applied, the configured budget always runs to the end.
//! Optimizer state (moment accumulators of the adaptive rule) lives in an
//! explicit per-batch struct so concurrent optimization runs cannot interfere.
use crate::criteria::AcqCriterion;
use crate::surrogate::PosteriorSurrogate;
use crate::types::{AcqObjData, Bounds};
use ndarray::{Array1, Array2, Array3, Axis};

/// Update rule of the gradient-ascent optimizer
#[derive(Clone, Copy, Debug)]
pub(crate) enum GradientRule {
    /// Adaptive per-coordinate steps from first and second gradient moment
    /// estimates
    Adam { beta1: f64, beta2: f64, epsilon: f64 },
    /// Plain ascent with a fixed step size
    Fixed,
}

impl GradientRule {
    pub fn adam() -> Self {
        GradientRule::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Moment estimates of the adaptive rule, one row per restart
struct MomentState {
    m: Array2<f64>,
    v: Array2<f64>,
}

/// Run `max_iters` ascent iterations on every restart of `batch` and return
/// the refined batch with the acquisition value per restart (NaN for restarts
/// killed by a non-finite value or gradient)
pub(crate) fn optimize_restarts_gradient(
    crit: &dyn AcqCriterion,
    model: &dyn PosteriorSurrogate,
    data: &AcqObjData,
    bounds: &Bounds,
    batch: &Array3<f64>,
    rule: GradientRule,
    max_iters: usize,
    learning_rate: f64,
) -> (Array3<f64>, Array1<f64>) {
    let (n_restarts, q, d) = batch.dim();
    let n = q * d;

    let mut xs = Array2::zeros((n_restarts, n));
    for r in 0..n_restarts {
        xs.row_mut(r)
            .assign(&batch.index_axis(Axis(0), r).iter().cloned().collect::<Array1<f64>>());
    }
    let mut alive = vec![true; n_restarts];
    let mut state = MomentState {
        m: Array2::zeros((n_restarts, n)),
        v: Array2::zeros((n_restarts, n)),
    };

    for iter in 0..max_iters {
        for r in 0..n_restarts {
            if !alive[r] {
                continue;
            }
            let x = xs.row(r).to_vec();
            let g = crit.grad(&x, model, data.best_f) / data.scale_acq;
            if g.iter().any(|v| !v.is_finite()) {
                log::warn!("restart {r} dropped: non-finite gradient at iteration {iter}");
                alive[r] = false;
                continue;
            }
            let mut row = xs.row_mut(r);
            match rule {
                GradientRule::Adam {
                    beta1,
                    beta2,
                    epsilon,
                } => {
                    let t = (iter + 1) as i32;
                    for j in 0..n {
                        let mj = beta1 * state.m[[r, j]] + (1. - beta1) * g[j];
                        let vj = beta2 * state.v[[r, j]] + (1. - beta2) * g[j] * g[j];
                        state.m[[r, j]] = mj;
                        state.v[[r, j]] = vj;
                        let m_hat = mj / (1. - beta1.powi(t));
                        let v_hat = vj / (1. - beta2.powi(t));
                        row[j] += learning_rate * m_hat / (v_hat.sqrt() + epsilon);
                    }
                }
                GradientRule::Fixed => {
                    for j in 0..n {
                        row[j] += learning_rate * g[j];
                    }
                }
            }
            let mut projected = row.to_vec();
            bounds.clamp(&mut projected);
            row.assign(&Array1::from(projected));
        }
    }

    let mut refined = batch.to_owned();
    let mut values = Array1::from_elem(n_restarts, f64::NAN);
    for r in 0..n_restarts {
        if !alive[r] {
            continue;
        }
        let x = xs.row(r).to_vec();
        let value = crit.value(&x, model, data.best_f);
        if value.is_finite() {
            refined
                .index_axis_mut(Axis(0), r)
                .assign(&xs.row(r).into_shape((q, d)).unwrap());
            values[r] = value;
        }
    }
    (refined, values)
}
