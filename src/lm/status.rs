//! Iteration bookkeeping for the Levenberg-Marquardt-Broyden loop.

use ndarray::Array1;

use crate::residual::Residual;
use crate::result::Phase;

/// Where iteration `i` of a problem with `n` optimized parameters sits in the
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationState {
    /// Evaluate the first initial guess.
    Start,

    /// Move parameter `k` to its second guess.
    Probe(usize),

    /// Damped step number `k`, starting at 1.
    Refine(usize),
}

impl IterationState {
    pub fn at(i: usize, n: usize) -> Self {
        if i == 0 {
            IterationState::Start
        } else if i <= n {
            IterationState::Probe(i - 1)
        } else {
            IterationState::Refine(i - n)
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            IterationState::Start | IterationState::Probe(_) => Phase::Bootstrap,
            IterationState::Refine(_) => Phase::Refine,
        }
    }
}

/// Bootstrap value for parameter `k`.
///
/// Uses the second guess when it differs from the first. Otherwise the
/// parameter is nudged: by `1.007·v0`, or to `(−1)^k·(7k + 1)` when both
/// guesses are zero.
pub fn probe_value(k: usize, v0: f64, v1: f64) -> f64 {
    if v1 != v0 {
        v1
    } else if v0 == 0.0 {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        sign * (7.0 * k as f64 + 1.0)
    } else {
        1.007 * v0
    }
}

/// State carried from one iteration to the next.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    /// Last successfully evaluated coefficients (unscaled)
    pub beta_old: Array1<f64>,

    /// Residuals at `beta_old`
    pub r_old: Array1<f64>,

    /// Best coefficients seen (unscaled)
    pub best_beta: Array1<f64>,

    /// Residuals at `best_beta`
    pub best_r: Array1<f64>,

    /// Norm at `best_beta`; never increases
    pub best_norm: f64,
}

impl IterationRecord {
    /// Record of the first successful evaluation.
    pub fn first(beta: Array1<f64>, residual: Residual) -> Self {
        Self {
            best_beta: beta.clone(),
            best_r: residual.r.clone(),
            best_norm: residual.norm,
            beta_old: beta,
            r_old: residual.r,
        }
    }

    /// Accept an evaluated point: keep the best and advance the old state.
    ///
    /// # Returns
    ///
    /// * True when the point improved the best norm
    pub fn accept(&mut self, beta: Array1<f64>, residual: Residual) -> bool {
        let improved = residual.norm < self.best_norm;
        if improved {
            self.best_norm = residual.norm;
            self.best_beta = beta.clone();
            self.best_r = residual.r.clone();
        }
        self.beta_old = beta;
        self.r_old = residual.r;
        improved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_states() {
        assert_eq!(IterationState::at(0, 2), IterationState::Start);
        assert_eq!(IterationState::at(1, 2), IterationState::Probe(0));
        assert_eq!(IterationState::at(2, 2), IterationState::Probe(1));
        assert_eq!(IterationState::at(3, 2), IterationState::Refine(1));
        assert_eq!(IterationState::at(3, 2).phase(), Phase::Refine);
        assert_eq!(IterationState::at(2, 2).phase(), Phase::Bootstrap);
    }

    #[test]
    fn test_probe_values() {
        assert_eq!(probe_value(0, 1.0, 2.0), 2.0);
        assert_eq!(probe_value(0, 0.0, 0.0), 1.0);
        assert_eq!(probe_value(1, 0.0, 0.0), -8.0);
        assert_eq!(probe_value(2, 0.0, 0.0), 15.0);
        assert_eq!(probe_value(3, 2.0, 2.0), 1.007 * 2.0);
    }

    #[test]
    fn test_best_norm_never_increases() {
        let residual = |norm: f64| Residual {
            r: array![norm.sqrt() * 1e6],
            norm,
        };
        let mut record = IterationRecord::first(array![0.0], residual(4.0));
        assert!(record.accept(array![1.0], residual(1.0)));
        assert!(!record.accept(array![2.0], residual(3.0)));
        assert_eq!(record.best_norm, 1.0);
        assert_eq!(record.best_beta, array![1.0]);
        assert_eq!(record.beta_old, array![2.0]);
    }
}
