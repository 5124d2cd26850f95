//! Acquisition optimization entry point.
use crate::criteria::AcqCriterion;
use crate::errors::{AcqError, Result};
use crate::initializer::init_start_candidates;
use crate::optimizers::{optimize_restarts_gradient, optimize_restarts_slsqp, GradientRule};
use crate::surrogate::PosteriorSurrogate;
use crate::types::{AcqObjData, AcqOptimizer, Bounds, OptimResult};
use crate::utils::find_best_candidate;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Acquisition optimization configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcqOptConfig {
    /// The optimizer used to refine the restart candidates
    pub(crate) optimizer: AcqOptimizer,
    /// Number of restarts of the multistart local search
    pub(crate) num_restarts: usize,
    /// Number of raw candidates scored to seed the restarts
    pub(crate) raw_samples: usize,
    /// Iteration budget of the gradient-ascent optimizers
    pub(crate) max_iters: usize,
    /// Step size of the gradient-ascent optimizers
    pub(crate) learning_rate: f64,
    /// A random generator seed used to get reproducible results
    pub(crate) seed: Option<u64>,
}

impl Default for AcqOptConfig {
    fn default() -> Self {
        AcqOptConfig {
            optimizer: AcqOptimizer::Slsqp,
            num_restarts: 20,
            raw_samples: 100,
            max_iters: 100,
            learning_rate: 0.02,
            seed: None,
        }
    }
}

impl AcqOptConfig {
    /// Sets the optimizer refining the restart candidates
    pub fn optimizer(mut self, optimizer: AcqOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets the number of restarts of the multistart local search
    pub fn num_restarts(mut self, num_restarts: usize) -> Self {
        self.num_restarts = num_restarts;
        self
    }

    /// Sets the number of raw candidates scored to seed the restarts
    pub fn raw_samples(mut self, raw_samples: usize) -> Self {
        self.raw_samples = raw_samples;
        self
    }

    /// Sets the iteration budget of the gradient-ascent optimizers
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Sets the step size of the gradient-ascent optimizers
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets a random generator seed to get reproducible results
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self, criterion: &dyn AcqCriterion) -> Result<()> {
        if self.num_restarts == 0 {
            return Err(AcqError::InvalidConfigError(
                "num_restarts must be positive".to_string(),
            ));
        }
        if self.raw_samples < self.num_restarts {
            return Err(AcqError::InvalidConfigError(format!(
                "raw_samples ({}) must be >= num_restarts ({})",
                self.raw_samples, self.num_restarts
            )));
        }
        match self.optimizer {
            AcqOptimizer::Slsqp => {
                if !criterion.is_deterministic() {
                    return Err(AcqError::OptimizerMisuseError(format!(
                        "{} resamples at every evaluation, its optimization with \
                         the SLSQP optimizer has undefined convergence behavior; \
                         use a gradient-ascent optimizer instead",
                        criterion.name()
                    )));
                }
            }
            AcqOptimizer::Adam | AcqOptimizer::Sga => {
                if self.max_iters == 0 {
                    return Err(AcqError::InvalidConfigError(
                        "max_iters must be positive".to_string(),
                    ));
                }
                if self.learning_rate <= 0. {
                    return Err(AcqError::InvalidConfigError(format!(
                        "learning_rate must be positive, got {}",
                        self.learning_rate
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Find the candidate (a batch of q points) maximizing the acquisition
/// criterion within bounds.
///
/// The search seeds `num_restarts` starting candidates from `raw_samples`
/// scored raw draws, refines every restart with the configured optimizer and
/// returns the best refined candidate with its acquisition value. Restarts
/// that finish with a non-finite value are discarded without affecting their
/// siblings.
pub fn optimize_acquisition(
    criterion: &dyn AcqCriterion,
    model: &dyn PosteriorSurrogate,
    best_f: f64,
    bounds: &Bounds,
    config: &AcqOptConfig,
) -> Result<OptimResult> {
    if criterion.q() == 0 {
        return Err(AcqError::InvalidConfigError(
            "criterion batch size q must be >= 1".to_string(),
        ));
    }
    if bounds.dim() != model.dim() {
        return Err(AcqError::InvalidConfigError(format!(
            "bounds dimension {} does not match model dimension {}",
            bounds.dim(),
            model.dim()
        )));
    }
    if !best_f.is_finite() {
        return Err(AcqError::InvalidConfigError(format!(
            "best observed value must be finite, got {best_f}"
        )));
    }
    config.validate(criterion)?;

    let mut rng = match config.seed {
        Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
        None => Xoshiro256Plus::from_entropy(),
    };

    log::info!(
        "Optimize acquisition criterion {} with {:?} ({} restarts)...",
        criterion.name(),
        config.optimizer,
        config.num_restarts
    );
    let (batch, scale_acq) = init_start_candidates(
        criterion,
        model,
        best_f,
        bounds,
        config.num_restarts,
        config.raw_samples,
        &mut rng,
    );
    let data = AcqObjData { best_f, scale_acq };

    let (refined, values) = match config.optimizer {
        AcqOptimizer::Slsqp => optimize_restarts_slsqp(criterion, model, &data, bounds, &batch),
        AcqOptimizer::Adam => optimize_restarts_gradient(
            criterion,
            model,
            &data,
            bounds,
            &batch,
            GradientRule::adam(),
            config.max_iters,
            config.learning_rate,
        ),
        AcqOptimizer::Sga => optimize_restarts_gradient(
            criterion,
            model,
            &data,
            bounds,
            &batch,
            GradientRule::Fixed,
            config.max_iters,
            config.learning_rate,
        ),
    };

    let (x_opt, value) = find_best_candidate(&refined, &values).ok_or_else(|| {
        AcqError::InvalidValueError("every restart finished with a non-finite value".to_string())
    })?;
    log::info!("Best candidate {} = {value:e} at x = {x_opt}", criterion.name());
    Ok(OptimResult { x_opt, value })
}
