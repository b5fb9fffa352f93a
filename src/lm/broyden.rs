//! Broyden secant approximation of the Jacobian.
//!
//! The matrix starts as all ones and is corrected with one rank-1 update per
//! iteration. No derivative of the model is ever evaluated.

use ndarray::{Array1, Array2};

use crate::error::{LmbOptError, Result};

/// Approximate m×n Jacobian owned by a single optimizer run.
///
/// With the sign convention `t = r_old - r_new`, the matrix approximates the
/// negated Jacobian of the residuals.
#[derive(Debug, Clone, PartialEq)]
pub struct BroydenJacobian {
    matrix: Array2<f64>,
}

impl BroydenJacobian {
    /// All-ones seed for `m` residuals and `n` parameters.
    pub fn new(m: usize, n: usize) -> Self {
        Self {
            matrix: Array2::ones((m, n)),
        }
    }

    /// Wrap an existing matrix.
    pub fn from_matrix(matrix: Array2<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Rank-1 secant update.
    ///
    /// ```text
    /// B ← B + (t − B·s) sᵀ / (sᵀs)
    /// ```
    ///
    /// Afterwards `B·s == t` up to rounding.
    ///
    /// # Arguments
    ///
    /// * `t` - Residual change `r_old - r_new` (length m)
    /// * `s` - Parameter step `β_new - β_old` (length n)
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` for wrongly sized inputs
    /// * `DegenerateStep` when `sᵀs` is zero or not finite
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::lm::BroydenJacobian;
    /// use ndarray::array;
    ///
    /// let mut b = BroydenJacobian::new(2, 2);
    /// let s = array![0.5, -1.0];
    /// let t = array![3.0, 1.0];
    /// b.update(&t, &s).unwrap();
    ///
    /// let bs = b.matrix().dot(&s);
    /// assert!((bs[0] - 3.0).abs() < 1e-12);
    /// assert!((bs[1] - 1.0).abs() < 1e-12);
    /// ```
    pub fn update(&mut self, t: &Array1<f64>, s: &Array1<f64>) -> Result<()> {
        let (m, n) = self.matrix.dim();
        if t.len() != m || s.len() != n {
            return Err(LmbOptError::DimensionMismatch(format!(
                "Broyden update on a {}x{} matrix needs t of length {} and s of length {}, got {} and {}",
                m,
                n,
                m,
                n,
                t.len(),
                s.len()
            )));
        }

        let s_mag = s.dot(s);
        if !(s_mag.is_finite() && s_mag > 0.0) {
            return Err(LmbOptError::DegenerateStep(format!("sᵀs = {}", s_mag)));
        }

        let bs = self.matrix.dot(s);
        let correction = (t - &bs) / s_mag;

        for i in 0..m {
            for j in 0..n {
                self.matrix[[i, j]] += correction[i] * s[j];
            }
        }

        Ok(())
    }
}
