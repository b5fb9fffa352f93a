//! # lmbopt-rs
//!
//! `lmbopt-rs` fits the coefficients of black-box models to reference values.
//!
//! The library provides:
//! - A derivative-free Levenberg-Marquardt solver with a Broyden secant Jacobian
//! - A Bayesian global search over the box spanned by two initial guesses
//! - A combined strategy alternating global search and local refinement
//! - A parameter catalog with scales, clamps and constants
//!
//! The model is anything implementing [`Evaluator`], including plain closures.
//! Residuals are relative (see [`residual`]), so reference values of very
//! different magnitude contribute alike.
//!
//! ## Basic Usage
//!
//! ```
//! use lmbopt_rs::{levenberg_marquardt_broyden, EvaluationFailure, FitOptions, ParameterSet};
//! use ndarray::{array, Array1};
//!
//! // y = x^β with β = 0.5
//! let x = array![1.0, 4.0, 9.0, 16.0];
//! let y = array![1.0, 2.0, 3.0, 4.0];
//! let model = |_: &ParameterSet, beta: &Array1<f64>| -> Result<Array1<f64>, EvaluationFailure> {
//!     Ok(x.mapv(|v: f64| v.powf(beta[0])))
//! };
//!
//! let mut params = ParameterSet::new();
//! params.add_param("beta", 0.1, 0.9).unwrap();
//!
//! let result = levenberg_marquardt_broyden(y, &params, &model, 50, 1e-6, &FitOptions::new()).unwrap();
//! assert!(result.success());
//! assert!((result.params.unwrap()[0] - 0.5).abs() < 1e-3);
//! ```

// Public modules
pub mod error;

// Parameter system
pub mod parameters;

pub mod config;
pub mod evaluator;
pub mod global_opt;
pub mod lm;
pub mod problem;
pub mod residual;
pub mod result;

mod utils;

use ndarray::Array1;

// Re-exports for convenience
pub use config::{Method, OptimizerConfig};
pub use error::{LmbOptError, Result};
pub use evaluator::{CancellationToken, EvaluationFailure, Evaluator};
pub use global_opt::{
    BayesianConfig, BayesianOptimizer, CombinedConfig, CombinedStrategy, GlobalOptimizer,
};
pub use lm::{LevenbergMarquardtBroyden, LmbConfig};
pub use parameters::{Bounds, Parameter, ParameterSet};
pub use problem::{FitOptions, FitProblem};
pub use result::{FitResult, FitStatus};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fit with the Levenberg-Marquardt-Broyden solver and default settings.
///
/// # Arguments
///
/// * `y` - Reference values
/// * `parameters` - Parameter catalog; the two initial guesses seed the bootstrap
/// * `evaluator` - The model
/// * `max_its` - Iteration budget
/// * `tol` - Convergence threshold on the residual norm
/// * `options` - Weight, scale and clamp overrides
///
/// # Errors
///
/// * Structurally invalid options (see [`FitProblem::new`])
pub fn levenberg_marquardt_broyden<E: Evaluator + ?Sized>(
    y: Array1<f64>,
    parameters: &ParameterSet,
    evaluator: &E,
    max_its: usize,
    tol: f64,
    options: &FitOptions,
) -> Result<FitResult> {
    levenberg_marquardt_broyden_with_config(
        y,
        parameters,
        evaluator,
        max_its,
        tol,
        options,
        &LmbConfig::default(),
    )
}

/// [`levenberg_marquardt_broyden`] with explicit solver settings.
pub fn levenberg_marquardt_broyden_with_config<E: Evaluator + ?Sized>(
    y: Array1<f64>,
    parameters: &ParameterSet,
    evaluator: &E,
    max_its: usize,
    tol: f64,
    options: &FitOptions,
    config: &LmbConfig,
) -> Result<FitResult> {
    let problem = FitProblem::new(y, parameters, options)?;
    LevenbergMarquardtBroyden::with_config(config.clone()).minimize(&problem, evaluator, max_its, tol)
}

/// Fit with the Bayesian global search.
///
/// The search box of each optimized parameter is spanned by its two initial
/// guesses (times its scale).
pub fn global_search<E: Evaluator + ?Sized>(
    y: Array1<f64>,
    parameters: &ParameterSet,
    evaluator: &E,
    max_its: usize,
    tol: f64,
    options: &FitOptions,
    config: &BayesianConfig,
) -> Result<FitResult> {
    let problem = FitProblem::new(y, parameters, options)?;
    BayesianOptimizer::with_config(config.clone()).search(&problem, evaluator, max_its, tol, true)
}

/// Fit with global search rounds, each refined by the local solver.
pub fn combined<E: Evaluator + ?Sized>(
    y: Array1<f64>,
    parameters: &ParameterSet,
    evaluator: &E,
    max_its: usize,
    tol: f64,
    options: &FitOptions,
    config: &CombinedConfig,
) -> Result<FitResult> {
    let problem = FitProblem::new(y, parameters, options)?;
    CombinedStrategy::with_config(config.clone()).minimize(&problem, evaluator, max_its, tol)
}
