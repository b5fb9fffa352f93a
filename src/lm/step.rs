//! Step calculation for the Levenberg-Marquardt-Broyden algorithm.
//!
//! Builds the damped normal equations from the secant Jacobian and solves
//! them with an SVD pseudo-inverse, so rank-deficient systems still yield a
//! (minimum-norm) step.

use log::warn;
use nalgebra::SVD;
use ndarray::{Array1, Array2};

use crate::error::{LmbOptError, Result};
use crate::lm::broyden::BroydenJacobian;
use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};

/// Largest entry of the normal equations accepted without shrinking the step.
pub const OVERFLOW_THRESHOLD: f64 = 1e150;

/// Result of a damped step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Updated (unscaled) coefficients `β + step_length·x`
    pub beta: Array1<f64>,

    /// Solution `x` of the damped normal equations
    pub direction: Array1<f64>,

    /// Applied step length; below 1 only when the overflow guard fired
    pub step_length: f64,

    /// Numerical rank of the damped matrix
    pub rank: usize,
}

/// Handles step calculation for the Levenberg-Marquardt-Broyden algorithm.
pub struct DampedStep;

impl DampedStep {
    /// Assemble `A = Bᵀ diag(w) B + λI` and `b = Bᵀ r`.
    ///
    /// Only the upper triangle of `A` is accumulated; the lower one is mirrored.
    pub fn normal_equations(
        residuals: &Array1<f64>,
        jacobian: &BroydenJacobian,
        lambda: f64,
        weight: &Array1<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let matrix = jacobian.matrix();
        let (m, n) = matrix.dim();
        if residuals.len() != m || weight.len() != m {
            return Err(LmbOptError::DimensionMismatch(format!(
                "Jacobian has {} rows, got {} residuals and {} weights",
                m,
                residuals.len(),
                weight.len()
            )));
        }

        let mut a = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            for i in j..n {
                let mut sum = 0.0;
                for k in 0..m {
                    sum += matrix[[k, i]] * matrix[[k, j]] * weight[k];
                }
                a[[i, j]] = sum;
                a[[j, i]] = sum;
            }
        }

        let mut b = Array1::<f64>::zeros(n);
        for j in 0..n {
            for i in 0..m {
                b[j] += matrix[[i, j]] * residuals[i];
            }
            a[[j, j]] += lambda;
        }

        Ok((a, b))
    }

    /// Least-squares solution of `A x = b` through the SVD pseudo-inverse.
    ///
    /// Singular values below `σ_max · ε · n` are treated as zero.
    ///
    /// # Returns
    ///
    /// * The solution and the numerical rank of `A`
    pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<(Array1<f64>, usize)> {
        let n = a.ncols();
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(LmbOptError::LinearSystemFailure(
                "normal equations contain non-finite entries".to_string(),
            ));
        }

        let svd = SVD::try_new(ndarray_to_nalgebra(a), true, true, f64::EPSILON, 0).ok_or_else(
            || LmbOptError::LinearSystemFailure("SVD did not converge".to_string()),
        )?;

        let max_sv = svd.singular_values.iter().cloned().fold(0.0, f64::max);
        if !(max_sv > 0.0) {
            return Err(LmbOptError::LinearSystemFailure(
                "normal matrix is zero".to_string(),
            ));
        }

        let cutoff = max_sv * f64::EPSILON * n.max(1) as f64;
        let rank = svd.singular_values.iter().filter(|&&s| s > cutoff).count();

        let x = svd
            .solve(&ndarray_vec_to_nalgebra(b), cutoff)
            .map_err(|e| LmbOptError::LinearSystemFailure(e.to_string()))?;
        let x = nalgebra_vec_to_ndarray(&x);

        if x.iter().any(|v| !v.is_finite()) {
            return Err(LmbOptError::LinearSystemFailure(
                "solution is not finite".to_string(),
            ));
        }

        Ok((x, rank))
    }

    /// Compute the next coefficients from the current residuals.
    ///
    /// # Arguments
    ///
    /// * `residuals` - Scaled residuals at `beta`
    /// * `jacobian` - Secant Jacobian approximation
    /// * `beta` - Current unscaled coefficients
    /// * `lambda` - Damping added to the diagonal
    /// * `weight` - Residual weights
    /// * `step_cap` - Optional `(ratio, last_step)`: every direction component
    ///   is limited to `ratio·|last_step_j|` where `last_step_j` is nonzero
    ///
    /// # Errors
    ///
    /// * `LinearSystemFailure` when the system cannot be solved
    pub fn step(
        residuals: &Array1<f64>,
        jacobian: &BroydenJacobian,
        beta: &Array1<f64>,
        lambda: f64,
        weight: &Array1<f64>,
        step_cap: Option<(f64, &Array1<f64>)>,
    ) -> Result<StepResult> {
        if beta.len() != jacobian.ncols() {
            return Err(LmbOptError::DimensionMismatch(format!(
                "Jacobian has {} columns, got {} coefficients",
                jacobian.ncols(),
                beta.len()
            )));
        }

        let (mut a, mut b) = Self::normal_equations(residuals, jacobian, lambda, weight)?;

        let max_mag = a
            .iter()
            .chain(b.iter())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let mut step_length = 1.0;
        if max_mag.is_finite() && max_mag > OVERFLOW_THRESHOLD {
            // Rescaling A and b together leaves x unchanged
            let factor = OVERFLOW_THRESHOLD / max_mag;
            warn!(
                "Normal equations reach {:.3e}, shortening the step to {:.3e} of its length",
                max_mag, factor
            );
            a.mapv_inplace(|v| v * factor);
            b.mapv_inplace(|v| v * factor);
            step_length = factor;
        }

        let (mut x, rank) = Self::solve(&a, &b)?;

        if let Some((ratio, last)) = step_cap {
            for (xj, &lj) in x.iter_mut().zip(last.iter()) {
                let limit = ratio * lj.abs();
                if lj != 0.0 && xj.abs() > limit {
                    *xj = limit.copysign(*xj);
                }
            }
        }

        let new_beta = beta + &(&x * step_length);

        Ok(StepResult {
            beta: new_beta,
            direction: x,
            step_length,
            rank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_normal_equations() {
        let jac = BroydenJacobian::from_matrix(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let r = array![1.0, 0.0, -1.0];
        let w = array![1.0, 2.0, 0.5];
        let (a, b) = DampedStep::normal_equations(&r, &jac, 0.25, &w).unwrap();

        // Bᵀ W B + λI
        assert_relative_eq!(a[[0, 0]], 1.0 + 18.0 + 12.5 + 0.25);
        assert_relative_eq!(a[[0, 1]], 2.0 + 24.0 + 15.0);
        assert_relative_eq!(a[[1, 0]], a[[0, 1]]);
        assert_relative_eq!(a[[1, 1]], 4.0 + 32.0 + 18.0 + 0.25);
        // Bᵀ r
        assert_relative_eq!(b[0], -4.0);
        assert_relative_eq!(b[1], -4.0);
    }

    #[test]
    fn test_gauss_newton_limit_solves_linear_model() {
        // r(β) = r0 - J (β - β0) exactly, so one undamped step lands on the root
        let jac = BroydenJacobian::from_matrix(array![[2.0, 0.0], [0.0, 4.0], [1.0, 1.0]]);
        let target = array![1.0, -2.0];
        let beta = array![0.0, 0.0];
        let r = jac.matrix().dot(&target);
        let w = Array1::ones(3);

        let result = DampedStep::step(&r, &jac, &beta, 0.0, &w, None).unwrap();
        assert_eq!(result.rank, 2);
        assert_eq!(result.step_length, 1.0);
        assert_relative_eq!(result.beta[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(result.beta[1], -2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_damping_shrinks_the_step() {
        let jac = BroydenJacobian::from_matrix(array![[1.0], [1.0]]);
        let r = array![1.0, 1.0];
        let w = Array1::ones(2);
        let beta = array![0.0];

        let small = DampedStep::step(&r, &jac, &beta, 0.01, &w, None).unwrap();
        let large = DampedStep::step(&r, &jac, &beta, 100.0, &w, None).unwrap();
        assert!(large.direction[0].abs() < small.direction[0].abs());
        assert_relative_eq!(large.direction[0], 2.0 / 102.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rank_deficient_system_is_tolerated() {
        // Identical columns and no damping: A = [[3, 3], [3, 3]], b = [9, 9].
        // Rank 1; the minimum-norm solution of x0 + x1 = 3 is [1.5, 1.5].
        let jac = BroydenJacobian::new(3, 2);
        let r = array![3.0, 3.0, 3.0];
        let w = Array1::ones(3);
        let result = DampedStep::step(&r, &jac, &array![0.0, 0.0], 0.0, &w, None).unwrap();
        assert_eq!(result.rank, 1);
        assert_relative_eq!(result.direction[0], 1.5, epsilon = 1e-10);
        assert_relative_eq!(result.direction[1], 1.5, epsilon = 1e-10);
    }

    #[test]
    fn test_zero_system_fails() {
        let jac = BroydenJacobian::from_matrix(Array2::zeros((2, 2)));
        let err = DampedStep::step(
            &array![1.0, 1.0],
            &jac,
            &array![0.0, 0.0],
            0.0,
            &Array1::ones(2),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LmbOptError::LinearSystemFailure(_)));
    }

    #[test]
    fn test_non_finite_system_fails() {
        let jac = BroydenJacobian::from_matrix(array![[f64::NAN]]);
        let err = DampedStep::step(&array![1.0], &jac, &array![0.0], 1.0, &array![1.0], None)
            .unwrap_err();
        assert!(matches!(err, LmbOptError::LinearSystemFailure(_)));
    }

    #[test]
    fn test_overflow_guard_shrinks_step_length() {
        let jac = BroydenJacobian::from_matrix(array![[1e80]]);
        let r = array![1e80];
        let result = DampedStep::step(&r, &jac, &array![0.0], 1.0, &array![1.0], None).unwrap();
        assert!(result.step_length < 1.0);
        assert!(result.beta[0].is_finite());
        assert_relative_eq!(result.direction[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(result.beta[0], result.step_length, epsilon = 1e-10);
    }

    #[test]
    fn test_step_cap() {
        let jac = BroydenJacobian::from_matrix(array![[1.0, 0.0], [0.0, 1.0]]);
        let r = array![10.0, 10.0];
        let last = array![0.01, 0.0];
        let result = DampedStep::step(
            &r,
            &jac,
            &array![0.0, 0.0],
            0.0,
            &Array1::ones(2),
            Some((100.0, &last)),
        )
        .unwrap();
        assert_relative_eq!(result.direction[0], 1.0, epsilon = 1e-12);
        // A zero previous change leaves the component uncapped
        assert_relative_eq!(result.direction[1], 10.0, epsilon = 1e-12);
    }
}
