//! Global optimization methods for finding global minima.
//!
//! This module provides the Bayesian global search and the combined strategy
//! that alternates it with the local Levenberg-Marquardt-Broyden solver.
//! Global search works inside the box spanned by the two initial guesses of
//! each parameter, so it can escape local minima that trap the local solver.

use ndarray::Array1;

use crate::error::Result;
use crate::evaluator::{CancellationToken, Evaluator};
use crate::problem::FitProblem;
use crate::result::FitResult;

pub mod acquisition;
pub mod bayesian;
pub mod combined;
pub mod domain_reduction;
pub mod gaussian_process;
pub mod parallel;

pub use acquisition::{AcquisitionFunction, AcquisitionKind};
pub use bayesian::{BayesianConfig, BayesianOptimizer, Objective};
pub use combined::{CombinedConfig, CombinedStrategy};
pub use domain_reduction::SequentialDomainReduction;
pub use gaussian_process::GaussianProcess;

/// Trait for global optimization methods.
///
/// A global optimizer keeps what it has learned between calls, so the
/// combined strategy can interleave it with local runs.
pub trait GlobalOptimizer {
    /// Sample the search box and return the best point found.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `evaluator` - The model
    /// * `max_iterations` - Number of samples to draw
    /// * `tol` - Stop once a sample's norm is below this
    /// * `warm_up` - Start with random samples before guided ones
    ///
    /// # Returns
    ///
    /// * The lowest-norm point seen, in physical units
    fn search<E: Evaluator + ?Sized>(
        &mut self,
        problem: &FitProblem,
        evaluator: &E,
        max_iterations: usize,
        tol: f64,
        warm_up: bool,
    ) -> Result<FitResult>;

    /// Register a point evaluated elsewhere.
    ///
    /// # Arguments
    ///
    /// * `params` - Physical parameter values
    /// * `residuals` - Scaled residuals at `params`
    fn observe(
        &mut self,
        problem: &FitProblem,
        params: &Array1<f64>,
        residuals: &Array1<f64>,
    ) -> Result<()>;

    /// Stop searching when `token` is cancelled.
    fn set_cancellation(&mut self, _token: CancellationToken) {}
}
