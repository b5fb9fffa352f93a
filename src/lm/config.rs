//! Configuration options for the Levenberg-Marquardt-Broyden algorithm.
//!
//! The defaults reproduce the classic solver: inverse-square damping, a
//! 0.1 % retry blend after a failed evaluation, no step cap and no trace.

use serde::{Deserialize, Serialize};

use crate::error::{LmbOptError, Result};

/// How the damping λ evolves during refinement.
///
/// `k` counts refinement steps starting at 1 (`k = i − n` for iteration `i`
/// of a problem with `n` optimized parameters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DampingSchedule {
    /// λ = 1 / k²
    InverseSquare,

    /// λ fixed for the whole run
    Constant { lambda: f64 },

    /// λ = initial · factor^(k − 1)
    Geometric { initial: f64, factor: f64 },
}

impl Default for DampingSchedule {
    fn default() -> Self {
        DampingSchedule::InverseSquare
    }
}

impl DampingSchedule {
    /// Damping for refinement step `k` (1-based).
    pub fn lambda(&self, k: usize) -> f64 {
        let k = k.max(1);
        match *self {
            DampingSchedule::InverseSquare => 1.0 / (k as f64).powi(2),
            DampingSchedule::Constant { lambda } => lambda,
            DampingSchedule::Geometric { initial, factor } => {
                initial * factor.powi((k - 1).min(i32::MAX as usize) as i32)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let ok = match *self {
            DampingSchedule::InverseSquare => true,
            DampingSchedule::Constant { lambda } => lambda.is_finite() && lambda >= 0.0,
            DampingSchedule::Geometric { initial, factor } => {
                initial.is_finite() && initial >= 0.0 && factor.is_finite() && factor > 0.0
            }
        };
        if ok {
            Ok(())
        } else {
            Err(LmbOptError::InvalidParameter(format!(
                "invalid damping schedule {:?}",
                self
            )))
        }
    }
}

/// Configuration options for the Levenberg-Marquardt-Broyden algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmbConfig {
    /// Damping schedule for refinement steps. Default: InverseSquare
    pub damping: DampingSchedule,

    /// Weight of the failed point when retrying after an evaluation failure:
    /// the retry evaluates `(1 − blend)·β_old + blend·β`. Default: 0.001
    pub retry_blend: f64,

    /// Cap each step component at `ratio·|previous change|`. Default: None
    pub max_step_ratio: Option<f64>,

    /// Record every accepted iterate in the result. Default: false
    pub record_trace: bool,
}

impl Default for LmbConfig {
    fn default() -> Self {
        Self {
            damping: DampingSchedule::default(),
            retry_blend: 0.001,
            max_step_ratio: None,
            record_trace: false,
        }
    }
}

impl LmbConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` if the retry blend is outside `(0, 1]`, the step
    ///   ratio is not positive, or the damping schedule is malformed
    pub fn validate(&self) -> Result<()> {
        if !(self.retry_blend > 0.0 && self.retry_blend <= 1.0) {
            return Err(LmbOptError::InvalidParameter(format!(
                "retry_blend must be in (0, 1], got {}",
                self.retry_blend
            )));
        }
        if let Some(ratio) = self.max_step_ratio {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(LmbOptError::InvalidParameter(format!(
                    "max_step_ratio must be positive, got {}",
                    ratio
                )));
            }
        }
        self.damping.validate()
    }
}
