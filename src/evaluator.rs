//! The black-box model contract.
//!
//! An [`Evaluator`] maps a physical parameter vector to one model value per
//! reference value. The optimizers know nothing else about it: it may wrap a
//! closed-form function, a lookup, or an external simulation.

use ndarray::Array1;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::parameters::ParameterSet;

/// Signal returned by an evaluator that could not produce output.
///
/// This is a recoverable condition: the local solver retries once with a
/// heavily damped step before giving up, and the global search skips the
/// point.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("evaluation failed: {message}")]
pub struct EvaluationFailure {
    pub message: String,
}

impl EvaluationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A model whose coefficients are being fitted.
///
/// Implementations must be deterministic for a fixed input within one run.
///
/// Any closure with the right signature is an evaluator:
///
/// ```
/// use lmbopt_rs::evaluator::{EvaluationFailure, Evaluator};
/// use lmbopt_rs::parameters::ParameterSet;
/// use ndarray::{array, Array1};
///
/// let model = |_: &ParameterSet, beta: &Array1<f64>| -> Result<Array1<f64>, EvaluationFailure> {
///     Ok(array![1.0, 2.0].mapv(|x: f64| x * beta[0]))
/// };
///
/// let out = model.evaluate(&ParameterSet::new(), &array![3.0]).unwrap();
/// assert_eq!(out, array![3.0, 6.0]);
/// ```
pub trait Evaluator {
    /// Evaluate the model.
    ///
    /// # Arguments
    ///
    /// * `catalog` - The parameter set of the run, for name lookups and
    ///   constant substitution (see [`ParameterSet::assemble`])
    /// * `beta` - Physical values of the optimized parameters, in catalog order
    ///
    /// # Returns
    ///
    /// * One model value per reference value, or an [`EvaluationFailure`]
    fn evaluate(
        &self,
        catalog: &ParameterSet,
        beta: &Array1<f64>,
    ) -> std::result::Result<Array1<f64>, EvaluationFailure>;
}

impl<F> Evaluator for F
where
    F: Fn(&ParameterSet, &Array1<f64>) -> std::result::Result<Array1<f64>, EvaluationFailure>,
{
    fn evaluate(
        &self,
        catalog: &ParameterSet,
        beta: &Array1<f64>,
    ) -> std::result::Result<Array1<f64>, EvaluationFailure> {
        self(catalog, beta)
    }
}

/// Cooperative cancellation flag shared between a caller and a running optimizer.
///
/// The optimizers check it before every evaluation; a cancelled run returns
/// the best result found so far.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Evaluate and check the output shape. Wrong lengths and non-finite values
/// are reported as evaluation failures.
pub(crate) fn checked_evaluate<E: Evaluator + ?Sized>(
    evaluator: &E,
    catalog: &ParameterSet,
    beta: &Array1<f64>,
    expected_len: usize,
) -> std::result::Result<Array1<f64>, EvaluationFailure> {
    let f = evaluator.evaluate(catalog, beta)?;
    if f.len() != expected_len {
        return Err(EvaluationFailure::new(format!(
            "expected {} model values, got {}",
            expected_len,
            f.len()
        )));
    }
    if f.iter().any(|v| !v.is_finite()) {
        return Err(EvaluationFailure::new("model returned non-finite values"));
    }
    Ok(f)
}
