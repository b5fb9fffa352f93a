//! Relative residuals and the objective norm.
//!
//! Residuals are relative to the reference value wherever the reference is
//! nonzero and absolute where it is zero. They are carried multiplied by
//! [`RESIDUAL_SCALE`] to keep the secant updates well conditioned; the norm
//! divides that factor back out, so it does not depend on it.

use ndarray::Array1;

use crate::error::{LmbOptError, Result};

/// Fixed magnification applied to every residual entry.
pub const RESIDUAL_SCALE: f64 = 1e6;

/// Residual vector together with its objective norm.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    /// Scaled residuals `RESIDUAL_SCALE * (f - y) / |y|`
    pub r: Array1<f64>,

    /// Sum of squared unscaled residuals
    pub norm: f64,
}

/// Compute residuals and norm of model output `f` against reference `y`.
///
/// # Examples
///
/// ```
/// use lmbopt_rs::residual::{compute_residual, RESIDUAL_SCALE};
/// use ndarray::array;
///
/// let res = compute_residual(&array![1.1, 0.5], &array![1.0, 0.0]).unwrap();
/// assert!((res.r[0] - 0.1 * RESIDUAL_SCALE).abs() < 1e-6);
/// assert!((res.r[1] - 0.5 * RESIDUAL_SCALE).abs() < 1e-6);
/// assert!((res.norm - (0.01 + 0.25)).abs() < 1e-12);
/// ```
pub fn compute_residual(f: &Array1<f64>, y: &Array1<f64>) -> Result<Residual> {
    if f.len() != y.len() {
        return Err(LmbOptError::DimensionMismatch(format!(
            "Model returned {} values for {} reference values",
            f.len(),
            y.len()
        )));
    }

    let r: Array1<f64> = f
        .iter()
        .zip(y.iter())
        .map(|(&fi, &yi)| {
            if yi != 0.0 {
                RESIDUAL_SCALE * (fi - yi) / yi.abs()
            } else {
                RESIDUAL_SCALE * (fi - yi)
            }
        })
        .collect();

    let norm = r.iter().map(|ri| (ri / RESIDUAL_SCALE).powi(2)).sum();

    Ok(Residual { r, norm })
}

/// Recover the model output from scaled residuals; inverse of [`compute_residual`].
pub fn model_output(r: &Array1<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    if r.len() != y.len() {
        return Err(LmbOptError::DimensionMismatch(format!(
            "Got {} residuals for {} reference values",
            r.len(),
            y.len()
        )));
    }

    Ok(r
        .iter()
        .zip(y.iter())
        .map(|(&ri, &yi)| {
            if yi != 0.0 {
                yi + ri * yi.abs() / RESIDUAL_SCALE
            } else {
                ri / RESIDUAL_SCALE
            }
        })
        .collect())
}

/// Weighted coefficient of determination of `f` against `y`.
///
/// A constant reference vector scores 1 when matched exactly and 0 otherwise.
pub fn r_squared(y: &Array1<f64>, f: &Array1<f64>, weight: &Array1<f64>) -> Result<f64> {
    if f.len() != y.len() || weight.len() != y.len() {
        return Err(LmbOptError::DimensionMismatch(format!(
            "R² needs equal lengths, got y={}, f={}, weight={}",
            y.len(),
            f.len(),
            weight.len()
        )));
    }

    let total_weight: f64 = weight.sum();
    if total_weight <= 0.0 {
        return Err(LmbOptError::InvalidInput(
            "R² needs at least one positive weight".to_string(),
        ));
    }
    let mean = weight.dot(y) / total_weight;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..y.len() {
        numerator += weight[i] * (y[i] - f[i]).powi(2);
        denominator += weight[i] * (y[i] - mean).powi(2);
    }

    if denominator == 0.0 {
        return Ok(if numerator == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - numerator / denominator)
}
