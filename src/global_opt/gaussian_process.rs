//! Gaussian-process surrogate for the Bayesian optimizer.
//!
//! Inputs are expected in the unit cube; targets are standardized internally.
//! The kernel is Matérn 5/2 with unit signal variance, and its length scale is
//! chosen from [`LENGTH_SCALE_GRID`] by maximum log marginal likelihood.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::Array1;

use crate::error::{LmbOptError, Result};

/// Candidate length scales (unit-cube units).
pub const LENGTH_SCALE_GRID: [f64; 9] = [0.05, 0.1, 0.2, 0.35, 0.5, 0.75, 1.0, 1.5, 2.0];

/// Extra diagonal terms tried when the kernel matrix is not positive definite.
const JITTER: [f64; 4] = [0.0, 1e-10, 1e-8, 1e-6];

/// Matérn 5/2 correlation at distance `d` for length scale `length_scale`.
pub fn matern52(d: f64, length_scale: f64) -> f64 {
    let z = 5.0_f64.sqrt() * d / length_scale;
    (1.0 + z + z * z / 3.0) * (-z).exp()
}

fn distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Fitted Gaussian-process regressor.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    x_train: Vec<Array1<f64>>,
    chol: Cholesky<f64, Dyn>,
    weights: DVector<f64>,
    y_mean: f64,
    y_std: f64,
    length_scale: f64,
    log_marginal_likelihood: f64,
}

impl GaussianProcess {
    /// Fit with the best length scale from [`LENGTH_SCALE_GRID`].
    ///
    /// # Arguments
    ///
    /// * `x` - Training inputs in the unit cube
    /// * `y` - Training targets
    /// * `alpha` - Noise variance added to the diagonal (standardized units)
    ///
    /// # Errors
    ///
    /// * `InvalidInput` for empty or mismatched training data
    /// * `LinearAlgebraError` when no grid value gives a factorizable kernel
    pub fn fit(x: &[Array1<f64>], y: &[f64], alpha: f64) -> Result<Self> {
        let mut best: Option<Self> = None;
        let mut last_err = None;
        for &length_scale in LENGTH_SCALE_GRID.iter() {
            match Self::fit_with_length_scale(x, y, alpha, length_scale) {
                Ok(gp) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |b| gp.log_marginal_likelihood > b.log_marginal_likelihood);
                    if better {
                        best = Some(gp);
                    }
                }
                Err(e) => last_err = Some(e),
            }
        }
        match (best, last_err) {
            (Some(gp), _) => Ok(gp),
            (None, Some(e)) => Err(e),
            (None, None) => Err(LmbOptError::LinearAlgebraError(
                "no length scale to try".to_string(),
            )),
        }
    }

    /// Fit with a fixed length scale.
    pub fn fit_with_length_scale(
        x: &[Array1<f64>],
        y: &[f64],
        alpha: f64,
        length_scale: f64,
    ) -> Result<Self> {
        let n = x.len();
        if n == 0 || y.len() != n {
            return Err(LmbOptError::InvalidInput(format!(
                "Gaussian process needs matching non-empty data, got {} inputs and {} targets",
                n,
                y.len()
            )));
        }
        if !(length_scale > 0.0) || !(alpha >= 0.0) {
            return Err(LmbOptError::InvalidParameter(format!(
                "length scale must be positive and alpha non-negative, got {} and {}",
                length_scale, alpha
            )));
        }

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if var > 0.0 && var.is_finite() { var.sqrt() } else { 1.0 };
        let y_norm = DVector::from_iterator(n, y.iter().map(|v| (v - y_mean) / y_std));

        let kernel = DMatrix::from_fn(n, n, |i, j| matern52(distance(&x[i], &x[j]), length_scale));

        let mut chol = None;
        for &jitter in JITTER.iter() {
            let mut k = kernel.clone();
            for i in 0..n {
                k[(i, i)] += alpha + jitter;
            }
            if let Some(c) = Cholesky::new(k) {
                chol = Some(c);
                break;
            }
        }
        let chol = chol.ok_or_else(|| {
            LmbOptError::LinearAlgebraError(format!(
                "kernel matrix is not positive definite (length scale {})",
                length_scale
            ))
        })?;

        let weights = chol.solve(&y_norm);
        let log_det: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let log_marginal_likelihood = -0.5 * y_norm.dot(&weights)
            - log_det
            - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();

        Ok(Self {
            x_train: x.to_vec(),
            chol,
            weights,
            y_mean,
            y_std,
            length_scale,
            log_marginal_likelihood,
        })
    }

    /// Posterior mean and standard deviation at `x`, in target units.
    pub fn predict(&self, x: &Array1<f64>) -> (f64, f64) {
        let n = self.x_train.len();
        let k_star = DVector::from_iterator(
            n,
            self.x_train
                .iter()
                .map(|xi| matern52(distance(xi, x), self.length_scale)),
        );

        let mean = k_star.dot(&self.weights);
        let variance = match self.chol.l_dirty().solve_lower_triangular(&k_star) {
            Some(v) => (1.0 - v.dot(&v)).max(0.0),
            None => 0.0,
        };

        (
            mean * self.y_std + self.y_mean,
            variance.sqrt() * self.y_std,
        )
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }

    pub fn len(&self) -> usize {
        self.x_train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_train.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_matern52() {
        assert_eq!(matern52(0.0, 1.0), 1.0);
        assert!(matern52(0.5, 1.0) < 1.0);
        assert!(matern52(0.5, 1.0) > matern52(1.0, 1.0));
        assert!(matern52(0.5, 2.0) > matern52(0.5, 1.0));
    }

    #[test]
    fn test_interpolates_training_data() {
        let x: Vec<Array1<f64>> = (0..6).map(|i| array![i as f64 / 5.0]).collect();
        let y: Vec<f64> = x.iter().map(|p| (3.0 * p[0]).sin()).collect();
        let gp = GaussianProcess::fit_with_length_scale(&x, &y, 1e-10, 0.35).unwrap();

        for (xi, yi) in x.iter().zip(y.iter()) {
            let (mean, std) = gp.predict(xi);
            assert_relative_eq!(mean, *yi, epsilon = 1e-4);
            assert!(std < 1e-3);
        }
    }

    #[test]
    fn test_length_scale_comes_from_grid() {
        let x: Vec<Array1<f64>> = (0..8).map(|i| array![i as f64 / 7.0]).collect();
        let y: Vec<f64> = x.iter().map(|p| p[0] * p[0]).collect();
        let gp = GaussianProcess::fit(&x, &y, 1e-6).unwrap();
        assert!(LENGTH_SCALE_GRID.contains(&gp.length_scale()));
        assert_eq!(gp.len(), 8);
        for &l in LENGTH_SCALE_GRID.iter() {
            if let Ok(other) = GaussianProcess::fit_with_length_scale(&x, &y, 1e-6, l) {
                assert!(other.log_marginal_likelihood() <= gp.log_marginal_likelihood());
            }
        }
    }

    #[test]
    fn test_uncertainty_grows_away_from_data() {
        let x = vec![array![0.0, 0.0], array![0.1, 0.0]];
        let y = vec![1.0, 2.0];
        let gp = GaussianProcess::fit_with_length_scale(&x, &y, 1e-6, 0.2).unwrap();
        let (_, near) = gp.predict(&array![0.05, 0.0]);
        let (_, far) = gp.predict(&array![1.0, 1.0]);
        assert!(far > near);
    }

    #[test]
    fn test_constant_targets() {
        let x = vec![array![0.2], array![0.8]];
        let y = vec![3.0, 3.0];
        let gp = GaussianProcess::fit(&x, &y, 1e-6).unwrap();
        let (mean, _) = gp.predict(&array![0.5]);
        assert_relative_eq!(mean, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicate_inputs_are_tolerated() {
        let x = vec![array![0.5], array![0.5], array![0.5]];
        let y = vec![1.0, 1.0, 1.0];
        assert!(GaussianProcess::fit(&x, &y, 0.0).is_ok());
    }

    #[test]
    fn test_empty_data_is_rejected() {
        assert!(matches!(
            GaussianProcess::fit(&[], &[], 1e-6),
            Err(LmbOptError::InvalidInput(_))
        ));
    }
}
