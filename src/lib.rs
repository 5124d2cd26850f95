//! This library implements acquisition function optimization for Bayesian
//! optimization: given a Gaussian process posterior and the best objective
//! value observed so far, it searches box-bounded domains for the batch of
//! points maximizing an acquisition criterion.
//!
//! It provides:
//! * the analytic Expected Improvement criterion [`EI`] with its closed-form
//!   gradient,
//! * the Monte-Carlo batch criterion [`QExpectedImprovement`] (qEI) estimated
//!   from joint posterior samples driven by a randomized quasi Monte-Carlo
//!   normal sampler ([`NormalQmcSampler`]),
//! * a multistart search ([`optimize_acquisition`]) seeding restarts from
//!   scored raw candidates and refining them with either the SLSQP bounded
//!   quasi-Newton optimizer or gradient ascent (Adam or plain), the latter
//!   being the required path for stochastic criteria.
//!
//! Criteria are evaluated against any model implementing
//! [`PosteriorSurrogate`]; [`GpPosterior`] is a ready-made implementation
//! conditioning a squared-exponential Gaussian process with fixed
//! hyperparameters on training data.
//!
//! # Example
//!
//! ```
//! use acqopt::{optimize_acquisition, AcqOptConfig, Bounds, GpPosterior, EI};
//! use ndarray::array;
//!
//! // Condition a 1-d GP on a handful of observations peaking around x = 0.5
//! let xt = array![[0.0], [0.25], [0.5], [0.75], [1.0]];
//! let yt = array![0.1, 0.6, 1.0, 0.4, -0.2];
//! let gp = GpPosterior::params().theta(array![0.2]).fit(&xt, &yt)?;
//!
//! // Maximize Expected Improvement over the best observed value
//! let bounds = Bounds::new(array![0.], array![1.])?;
//! let config = AcqOptConfig::default().seed(42);
//! let res = optimize_acquisition(&EI, &gp, 1.0, &bounds, &config)?;
//!
//! assert!((0.0..=1.0).contains(&res.x_opt[[0, 0]]));
//! assert!(res.value >= 0.);
//! # Ok::<(), acqopt::AcqError>(())
//! ```
mod criteria;
mod errors;
mod initializer;
mod optimize;
mod optimizers;
mod sampler;
mod surrogate;
mod types;
mod utils;

pub use crate::criteria::*;
pub use crate::errors::*;
pub use crate::optimize::*;
pub use crate::sampler::*;
pub use crate::surrogate::*;
pub use crate::types::*;
pub use crate::utils::{find_best_candidate, norm_cdf, norm_pdf, norm_quantile};
