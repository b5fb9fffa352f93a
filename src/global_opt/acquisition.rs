//! Acquisition functions for the Bayesian optimizer.
//!
//! All acquisitions are maximized. `y_max` is the best target registered so far.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

/// Which acquisition function guides the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    /// Upper confidence bound: `mean + κ·std`
    Ucb,

    /// Expected improvement over `y_max + ξ`
    Ei,

    /// Probability of improvement over `y_max + ξ`
    Poi,
}

impl Default for AcquisitionKind {
    fn default() -> Self {
        AcquisitionKind::Ucb
    }
}

/// Standard normal density.
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Standard normal distribution function.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Acquisition function with its exploration schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionFunction {
    kind: AcquisitionKind,
    kappa: f64,
    xi: f64,
    kappa_decay: f64,
    kappa_decay_delay: usize,
    iterations: usize,
}

impl AcquisitionFunction {
    pub fn new(kind: AcquisitionKind, kappa: f64, xi: f64) -> Self {
        Self {
            kind,
            kappa,
            xi,
            kappa_decay: 1.0,
            kappa_decay_delay: 0,
            iterations: 0,
        }
    }

    /// Multiply κ by `decay` on every update after the first `delay` ones.
    pub fn with_decay(mut self, decay: f64, delay: usize) -> Self {
        self.kappa_decay = decay;
        self.kappa_decay_delay = delay;
        self
    }

    pub fn kind(&self) -> AcquisitionKind {
        self.kind
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    /// Advance the schedule; called once before every guided suggestion.
    pub fn update_params(&mut self) {
        self.iterations += 1;
        if self.kappa_decay < 1.0 && self.iterations > self.kappa_decay_delay {
            self.kappa *= self.kappa_decay;
        }
    }

    /// Score a point from the surrogate's posterior `mean` and `std`.
    pub fn evaluate(&self, mean: f64, std: f64, y_max: f64) -> f64 {
        match self.kind {
            AcquisitionKind::Ucb => mean + self.kappa * std,
            AcquisitionKind::Ei => {
                let a = mean - y_max - self.xi;
                if std <= 0.0 {
                    return a.max(0.0);
                }
                let z = a / std;
                a * normal_cdf(z) + std * normal_pdf(z)
            }
            AcquisitionKind::Poi => {
                let a = mean - y_max - self.xi;
                if std <= 0.0 {
                    return if a > 0.0 { 1.0 } else { 0.0 };
                }
                normal_cdf(a / std)
            }
        }
    }
}
